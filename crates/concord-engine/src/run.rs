//! The per-run scheduler.
//!
//! Nodes are visited in topological order. A node starts once every
//! predecessor is terminal; a node that is not best-effort is skipped
//! instead when any predecessor failed or was skipped. At most
//! `max_parallelism` node tasks run at once.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use concord_workflow::Workflow;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::node::{NodeInputs, RunEnv, run_node};
use crate::result::{FailureReason, NodeExecutionState, NodeOutput, NodeStatus};

type NodeOutcome = Result<NodeOutput, FailureReason>;

pub(crate) struct Scheduler<'a, N: ExecutionNotifier> {
  workflow: &'a Workflow,
  env: Arc<RunEnv>,
  notifier: &'a N,
  cancel: &'a CancellationToken,
  max_parallelism: usize,
  states: BTreeMap<String, NodeExecutionState>,
}

impl<'a, N: ExecutionNotifier> Scheduler<'a, N> {
  pub fn new(
    workflow: &'a Workflow,
    env: Arc<RunEnv>,
    notifier: &'a N,
    cancel: &'a CancellationToken,
    max_parallelism: usize,
  ) -> Self {
    let states = workflow
      .nodes()
      .keys()
      .map(|node_id| (node_id.clone(), NodeExecutionState::pending(node_id)))
      .collect();
    Self {
      workflow,
      env,
      notifier,
      cancel,
      max_parallelism: max_parallelism.max(1),
      states,
    }
  }

  /// Drive every node to a terminal status.
  pub async fn run(mut self) -> BTreeMap<String, NodeExecutionState> {
    let mut tasks: JoinSet<(String, NodeOutcome)> = JoinSet::new();

    loop {
      if !self.cancel.is_cancelled() {
        self.skip_blocked();
        self.spawn_ready(&mut tasks);
      }

      let Some(joined) = tasks.join_next().await else {
        break;
      };
      match joined {
        Ok((node_id, outcome)) => self.finish(&node_id, outcome),
        // Panics are caught inside the task and nothing aborts the set.
        Err(err) => error!(run_id = %self.env.run_id, error = %err, "node_task_lost"),
      }
    }

    // Only reachable with pending nodes after cancellation.
    let leftover: Vec<String> = self.pending().collect();
    for node_id in leftover {
      self.settle(&node_id, NodeStatus::Skipped, None, Some(FailureReason::Cancelled));
    }

    self.states
  }

  fn pending(&self) -> impl Iterator<Item = String> + '_ {
    self
      .workflow
      .topological_order()
      .iter()
      .filter(|node_id| self.status(node_id) == NodeStatus::Pending)
      .cloned()
  }

  fn status(&self, node_id: &str) -> NodeStatus {
    self
      .states
      .get(node_id)
      .map_or(NodeStatus::Pending, |state| state.status)
  }

  fn is_best_effort(&self, node_id: &str) -> bool {
    self
      .workflow
      .get_node(node_id)
      .is_some_and(|node| node.best_effort)
  }

  /// Skip pending nodes that require an upstream which can no longer
  /// complete. Topological order makes one pass cascade.
  fn skip_blocked(&mut self) {
    let pending: Vec<String> = self.pending().collect();
    for node_id in pending {
      if self.is_best_effort(&node_id) {
        continue;
      }
      let blocked_by = self
        .workflow
        .graph()
        .upstream(&node_id)
        .iter()
        .find(|pred| matches!(self.status(pred), NodeStatus::Failed | NodeStatus::Skipped))
        .cloned();
      if let Some(pred) = blocked_by {
        info!(
          run_id = %self.env.run_id,
          node_id = %node_id,
          upstream = %pred,
          "node_skipped"
        );
        self.settle(
          &node_id,
          NodeStatus::Skipped,
          None,
          Some(FailureReason::UpstreamFailed { node_id: pred }),
        );
      }
    }
  }

  fn spawn_ready(&mut self, tasks: &mut JoinSet<(String, NodeOutcome)>) {
    let pending: Vec<String> = self.pending().collect();
    for node_id in pending {
      if tasks.len() >= self.max_parallelism {
        break;
      }
      let graph = self.workflow.graph();
      if !graph
        .upstream(&node_id)
        .iter()
        .all(|pred| self.status(pred).is_terminal())
      {
        continue;
      }
      let Some(node) = self.workflow.get_node(&node_id).cloned() else {
        continue;
      };

      let mut inputs = NodeInputs::default();
      for pred in graph.upstream(&node_id) {
        match self.states.get(pred).and_then(|state| state.output.as_ref()) {
          Some(output) => {
            inputs.upstream.insert(pred.clone(), output.clone());
          }
          None => inputs.missing.push(pred.clone()),
        }
      }

      if let Some(state) = self.states.get_mut(&node_id) {
        state.status = NodeStatus::Running;
        state.started_at = Some(Utc::now());
      }
      self.emit(&node_id, NodeStatus::Running, None);
      info!(
        run_id = %self.env.run_id,
        node_id = %node_id,
        kind = node.kind.name(),
        "node_started"
      );

      let env = Arc::clone(&self.env);
      let cancel = self.cancel.clone();
      tasks.spawn(async move {
        let execute = AssertUnwindSafe(run_node(&node, inputs, &env)).catch_unwind();
        let outcome = tokio::select! {
          biased;
          _ = cancel.cancelled() => Err(FailureReason::Cancelled),
          caught = execute => caught.unwrap_or_else(|panic| {
            let message = panic
              .downcast_ref::<&str>()
              .map(|s| s.to_string())
              .or_else(|| panic.downcast_ref::<String>().cloned())
              .unwrap_or_else(|| "node task panicked".to_string());
            Err(FailureReason::Internal { message })
          }),
        };
        (node_id, outcome)
      });
    }
  }

  fn finish(&mut self, node_id: &str, outcome: NodeOutcome) {
    match outcome {
      Ok(output) => {
        info!(run_id = %self.env.run_id, node_id = %node_id, "node_completed");
        self.settle(node_id, NodeStatus::Done, Some(output), None);
      }
      Err(reason) => {
        warn!(
          run_id = %self.env.run_id,
          node_id = %node_id,
          reason = %reason,
          "node_failed"
        );
        self.settle(node_id, NodeStatus::Failed, None, Some(reason));
      }
    }
  }

  fn settle(
    &mut self,
    node_id: &str,
    status: NodeStatus,
    output: Option<NodeOutput>,
    reason: Option<FailureReason>,
  ) {
    if let Some(state) = self.states.get_mut(node_id) {
      state.status = status;
      state.output = output;
      state.reason = reason.clone();
      state.finished_at = Some(Utc::now());
    }
    self.emit(node_id, status, reason);
  }

  fn emit(&self, node_id: &str, status: NodeStatus, reason: Option<FailureReason>) {
    self.notifier.notify(ExecutionEvent::NodeStatusChanged {
      run_id: self.env.run_id.clone(),
      node_id: node_id.to_string(),
      status,
      timestamp: Utc::now(),
      reason,
    });
  }
}
