mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
  ScriptedProvider, consensus_workflow, drain, harness, secret, single_generate,
};
use concord_config::{ChunkPolicy, ExecutionOptions, WorkflowDef};
use concord_engine::{
  EngineConfig, ExecutionError, ExecutionEvent, FailureReason, InMemoryRunStore, NodeStatus,
  RunStatus, RunStore, Submission,
};
use concord_provider::{Pricing, ProviderError, ProviderErrorKind};
use concord_workflow::WorkflowError;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn workflow(value: serde_json::Value) -> WorkflowDef {
  serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_cycle_rejected_before_any_node_runs() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes"));
  let mut h = harness(EngineConfig::default(), &[p1.clone()]);
  let cyclic = workflow(json!({
    "workflow_id": "cyclic",
    "name": "cyclic",
    "nodes": [
      { "node_id": "a", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "b", "type": "generate", "provider": "p1", "model": "m" }
    ],
    "edges": [{ "from": "a", "to": "b" }, { "from": "b", "to": "a" }]
  }));

  let err = h.engine.execute(Submission::new(cyclic)).await.unwrap_err();

  assert!(matches!(
    err,
    ExecutionError::GraphInvalid(WorkflowError::Cycle(_))
  ));
  assert_eq!(p1.calls(), 0);
  assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_unknown_provider_rejected() {
  let h = harness(EngineConfig::default(), &[]);
  let err = h
    .engine
    .execute(Submission::new(single_generate(100, ChunkPolicy::SubmitAll)))
    .await
    .unwrap_err();
  assert!(matches!(err, ExecutionError::UnknownProvider(name) if name == "p1"));
}

#[tokio::test]
async fn test_malformed_credential_rejected() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes"));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let submission = Submission::new(single_generate(100, ChunkPolicy::SubmitAll))
    .with_input("doc", "text")
    .with_credential("p1", "short");

  let err = h.engine.execute(submission).await.unwrap_err();

  assert!(matches!(err, ExecutionError::InvalidCredential { provider, .. } if provider == "p1"));
  assert_eq!(p1.calls(), 0);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "Yes."));
  let p2 = Arc::new(ScriptedProvider::replying("p2", "Yes, agreed."));
  let mut h = harness(EngineConfig::default(), &[p1, p2]);
  let submission = Submission::new(consensus_workflow())
    .with_input("question", "Proceed?")
    .with_credential("p1", secret("p1"))
    .with_credential("p2", secret("p2"));

  let result = h.engine.execute(submission).await.unwrap();
  let events = drain(&mut h.events);

  assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { run_id, .. }) if *run_id == result.run_id));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::RunFinished { status: RunStatus::Completed, .. })
  ));

  for node_id in result.nodes.keys() {
    let statuses: Vec<NodeStatus> = events
      .iter()
      .filter_map(|event| match event {
        ExecutionEvent::NodeStatusChanged {
          node_id: id, status, ..
        } if id == node_id => Some(*status),
        _ => None,
      })
      .collect();
    assert_eq!(statuses, vec![NodeStatus::Running, NodeStatus::Done], "{}", node_id);
  }
}

#[tokio::test]
async fn test_failed_upstream_skips_required_descendants() {
  let p1 = Arc::new(ScriptedProvider::failing(
    "p1",
    ProviderError::Auth("key revoked".to_string()),
  ));
  let p2 = Arc::new(ScriptedProvider::replying("p2", "summary"));
  let h = harness(EngineConfig::default(), &[p1.clone(), p2.clone()]);
  let chain = workflow(json!({
    "workflow_id": "chain",
    "name": "chain",
    "nodes": [
      { "node_id": "doc", "type": "source" },
      { "node_id": "draft", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "polish", "type": "generate", "provider": "p2", "model": "m" },
      { "node_id": "out", "type": "sink" }
    ],
    "edges": [
      { "from": "doc", "to": "draft" },
      { "from": "draft", "to": "polish" },
      { "from": "polish", "to": "out" }
    ]
  }));
  let submission = Submission::new(chain)
    .with_input("doc", "text")
    .with_credential("p1", secret("p1"))
    .with_credential("p2", secret("p2"));

  let result = h.engine.execute(submission).await.unwrap();

  assert_eq!(result.status, RunStatus::Failed);
  let draft = result.node("draft").unwrap();
  assert_eq!(draft.status, NodeStatus::Failed);
  assert!(matches!(
    draft.reason,
    Some(FailureReason::Provider {
      error: ProviderErrorKind::Auth,
      ..
    })
  ));
  // Auth failures are permanent: no retry.
  assert_eq!(p1.calls(), 1);

  let polish = result.node("polish").unwrap();
  assert_eq!(polish.status, NodeStatus::Skipped);
  assert_eq!(
    polish.reason,
    Some(FailureReason::UpstreamFailed {
      node_id: "draft".to_string()
    })
  );
  assert_eq!(
    result.node("out").unwrap().reason,
    Some(FailureReason::UpstreamFailed {
      node_id: "polish".to_string()
    })
  );
  assert_eq!(p2.calls(), 0);
  assert_eq!(result.node("doc").unwrap().status, NodeStatus::Done);
}

#[tokio::test]
async fn test_best_effort_generate_runs_on_partial_input() {
  let p1 = Arc::new(ScriptedProvider::failing(
    "p1",
    ProviderError::InvalidRequest("bad model".to_string()),
  ));
  let p2 = Arc::new(ScriptedProvider::echo("p2"));
  let h = harness(EngineConfig::default(), &[p1, p2]);
  let merge = workflow(json!({
    "workflow_id": "merge",
    "name": "merge",
    "nodes": [
      { "node_id": "doc", "type": "source" },
      { "node_id": "draft", "type": "generate", "provider": "p1", "model": "m" },
      {
        "node_id": "merge",
        "type": "generate",
        "provider": "p2",
        "model": "m",
        "best_effort": true
      }
    ],
    "edges": [
      { "from": "doc", "to": "draft" },
      { "from": "doc", "to": "merge" },
      { "from": "draft", "to": "merge" }
    ]
  }));
  let submission = Submission::new(merge)
    .with_input("doc", "only the source survives")
    .with_credential("p1", secret("p1"))
    .with_credential("p2", secret("p2"));

  let result = h.engine.execute(submission).await.unwrap();

  assert_eq!(result.node("draft").unwrap().status, NodeStatus::Failed);
  let merged = result.output("merge").unwrap().as_generation().unwrap();
  assert_eq!(merged.text, "only the source survives");
  assert_eq!(result.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_missing_source_input() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes"));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let submission = Submission::new(single_generate(100, ChunkPolicy::SubmitAll))
    .with_credential("p1", secret("p1"));

  let result = h.engine.execute(submission).await.unwrap();

  let doc = result.node("doc").unwrap();
  assert_eq!(doc.status, NodeStatus::Failed);
  assert_eq!(doc.reason, Some(FailureReason::MissingInput));
  assert_eq!(result.node("gen").unwrap().status, NodeStatus::Skipped);
  assert_eq!(p1.calls(), 0);
}

#[tokio::test]
async fn test_credential_looked_up_at_call_time() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes"));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let submission =
    || Submission::new(single_generate(100, ChunkPolicy::SubmitAll)).with_input("doc", "text");

  let first = h.engine.execute(submission()).await.unwrap();
  assert_eq!(
    first.node("gen").unwrap().reason,
    Some(FailureReason::MissingCredential {
      provider: "p1".to_string()
    })
  );

  h.credentials.set("p1", secret("p1"));
  let second = h.engine.execute(submission()).await.unwrap();
  assert_eq!(second.node("gen").unwrap().status, NodeStatus::Done);
  assert_eq!(p1.calls(), 1);
}

#[tokio::test]
async fn test_budget_ceiling_stops_further_calls() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "text").with_pricing(Pricing {
    prompt_per_1k: 100.0,
    completion_per_1k: 0.0,
  }));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let chain = workflow(json!({
    "workflow_id": "budget",
    "name": "budget",
    "nodes": [
      { "node_id": "doc", "type": "source" },
      { "node_id": "first", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "second", "type": "generate", "provider": "p1", "model": "m" }
    ],
    "edges": [
      { "from": "doc", "to": "first" },
      { "from": "first", "to": "second" }
    ]
  }));
  let submission = Submission::new(chain)
    .with_input("doc", "text")
    .with_credential("p1", secret("p1"))
    .with_options(ExecutionOptions {
      budget_ceiling: Some(1.0),
      ..ExecutionOptions::default()
    });

  let result = h.engine.execute(submission).await.unwrap();

  assert_eq!(result.node("first").unwrap().status, NodeStatus::Done);
  assert!(matches!(
    result.node("second").unwrap().reason,
    Some(FailureReason::BudgetExceeded { .. })
  ));
  assert_eq!(p1.calls(), 1);
  assert!((result.estimated_cost - 1.0).abs() < 1e-9);
  assert_eq!(result.usage.total, 15);
}

#[tokio::test]
async fn test_max_parallelism_bounds_in_flight_nodes() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "ok").with_delay(Duration::from_millis(50)));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let fan_out = workflow(json!({
    "workflow_id": "fan_out",
    "name": "fan out",
    "nodes": [
      { "node_id": "doc", "type": "source" },
      { "node_id": "g1", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "g2", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "g3", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "g4", "type": "generate", "provider": "p1", "model": "m" },
      { "node_id": "out", "type": "sink" }
    ],
    "edges": [
      { "from": "doc", "to": "g1" },
      { "from": "doc", "to": "g2" },
      { "from": "doc", "to": "g3" },
      { "from": "doc", "to": "g4" },
      { "from": "g1", "to": "out" },
      { "from": "g2", "to": "out" },
      { "from": "g3", "to": "out" },
      { "from": "g4", "to": "out" }
    ]
  }));
  let submission = Submission::new(fan_out)
    .with_input("doc", "text")
    .with_credential("p1", secret("p1"))
    .with_options(ExecutionOptions {
      max_parallelism: Some(2),
      ..ExecutionOptions::default()
    });

  let result = h.engine.execute(submission).await.unwrap();

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(p1.calls(), 4);
  assert!(p1.peak_in_flight() <= 2);
}

#[tokio::test]
async fn test_cancellation_fails_running_and_skips_pending() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes").with_delay(Duration::from_secs(10)));
  let p2 = Arc::new(ScriptedProvider::replying("p2", "yes").with_delay(Duration::from_secs(10)));
  let mut h = harness(EngineConfig::default(), &[p1, p2]);
  let submission = Submission::new(consensus_workflow())
    .with_input("question", "Proceed?")
    .with_credential("p1", secret("p1"))
    .with_credential("p2", secret("p2"));
  let cancel = CancellationToken::new();

  let run = h.engine.execute_with_cancel(submission, cancel.clone());
  let events = &mut h.events;
  let watcher = async {
    let mut started = 0;
    while let Some(event) = events.recv().await {
      if let ExecutionEvent::NodeStatusChanged {
        node_id,
        status: NodeStatus::Running,
        ..
      } = event
      {
        if node_id.starts_with("gen_") {
          started += 1;
          if started == 2 {
            cancel.cancel();
            return;
          }
        }
      }
    }
  };
  let (result, ()) = tokio::join!(run, watcher);
  let result = result.unwrap();

  assert_eq!(result.status, RunStatus::Cancelled);
  assert_eq!(result.node("question").unwrap().status, NodeStatus::Done);
  for node_id in ["gen_p1", "gen_p2"] {
    let state = result.node(node_id).unwrap();
    assert_eq!(state.status, NodeStatus::Failed);
    assert_eq!(state.reason, Some(FailureReason::Cancelled));
  }
  for node_id in ["compare", "report"] {
    let state = result.node(node_id).unwrap();
    assert_eq!(state.status, NodeStatus::Skipped);
    assert_eq!(state.reason, Some(FailureReason::Cancelled));
  }

  let rest = drain(&mut h.events);
  assert!(matches!(
    rest.last(),
    Some(ExecutionEvent::RunFinished {
      status: RunStatus::Cancelled,
      ..
    })
  ));
}

#[tokio::test]
async fn test_finished_runs_reach_the_store() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "yes"));
  let store = Arc::new(InMemoryRunStore::new());
  let h = harness(EngineConfig::default(), &[p1]);
  let engine = h.engine.with_run_store(store.clone());
  let submission = Submission::new(single_generate(100, ChunkPolicy::SubmitAll))
    .with_input("doc", "text")
    .with_credential("p1", secret("p1"));

  let result = engine.execute(submission).await.unwrap();

  assert_eq!(store.len().await, 1);
  let saved = store.get(&result.run_id).await.unwrap().unwrap();
  assert_eq!(saved, result);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_provider_fails_with_timeout_after_one_retry() {
  let p1 = Arc::new(ScriptedProvider::replying("p1", "late").with_delay(Duration::from_secs(3_600)));
  let h = harness(EngineConfig::default(), &[p1.clone()]);
  let submission = Submission::new(single_generate(100, ChunkPolicy::SubmitAll))
    .with_input("doc", "text")
    .with_credential("p1", secret("p1"));

  let result = h.engine.execute(submission).await.unwrap();

  let generation = result.node("gen").unwrap();
  assert_eq!(generation.status, NodeStatus::Failed);
  assert_eq!(
    generation.reason,
    Some(FailureReason::Timeout {
      after_ms: h.engine.config().timeout.initial_ms
    })
  );
  assert_eq!(p1.calls(), 2);
  assert_eq!(result.status, RunStatus::Failed);
}
