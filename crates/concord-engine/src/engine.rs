//! Workflow execution engine.
//!
//! The `Engine` validates a submission, then drives its graph to completion.
//! Nodes run in parallel once their dependencies are settled.

use std::sync::Arc;

use chrono::Utc;
use concord_workflow::Workflow;
use minijinja::Environment;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::budget::CostTracker;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::credentials::SuppliedCredentials;
use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::node::RunEnv;
use crate::result::{ExecutionResult, NodeStatus, RunStatus};
use crate::run::Scheduler;
use crate::store::RunStore;
use crate::submission::Submission;

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `Engine::new()` for an engine with no-op notifications,
/// or `Engine::with_notifier()` to provide a custom notifier.
///
/// Breaker, rate and latency state live in the shared [`ExecutionContext`],
/// so every run of this engine sees the same view of each provider.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  config: EngineConfig,
  context: Arc<ExecutionContext>,
  runs: Arc<Semaphore>,
  notifier: N,
  store: Option<Arc<dyn RunStore>>,
}

impl Engine<NoopNotifier> {
  /// Create an engine whose events are discarded.
  pub fn new(config: EngineConfig, context: Arc<ExecutionContext>) -> Self {
    Self::with_notifier(config, context, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Engine<N> {
  pub fn with_notifier(config: EngineConfig, context: Arc<ExecutionContext>, notifier: N) -> Self {
    let runs = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
    Self {
      config,
      context,
      runs,
      notifier,
      store: None,
    }
  }

  /// Hand every finished run to `store`.
  pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn context(&self) -> &Arc<ExecutionContext> {
    &self.context
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub async fn execute(&self, submission: Submission) -> Result<ExecutionResult, ExecutionError> {
    self
      .execute_with_cancel(submission, CancellationToken::new())
      .await
  }

  /// Execute one run to completion.
  ///
  /// Returns an error only when the submission is rejected before any node
  /// runs. Node failures are recorded in the result.
  #[instrument(
    name = "workflow_execute",
    skip(self, submission, cancel),
    fields(workflow_id = %submission.workflow.workflow_id)
  )]
  pub async fn execute_with_cancel(
    &self,
    submission: Submission,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    let workflow = Workflow::from_def(&submission.workflow)?;
    if let Some(unknown) = workflow
      .providers()
      .into_iter()
      .find(|name| !self.context.providers.contains(name))
    {
      return Err(ExecutionError::UnknownProvider(unknown.to_string()));
    }
    let credentials = SuppliedCredentials::validate(&submission.credentials)?;

    let _slot = Arc::clone(&self.runs)
      .acquire_owned()
      .await
      .map_err(|e| ExecutionError::Internal(e.to_string()))?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let workflow_id = workflow.workflow_id.clone();
    let started_at = Utc::now();
    info!(
      run_id = %run_id,
      workflow_id = %workflow_id,
      nodes = workflow.nodes().len(),
      "workflow_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: run_id.clone(),
      workflow_id: workflow_id.clone(),
      timestamp: started_at,
    });

    let max_parallelism = submission
      .options
      .max_parallelism
      .unwrap_or(self.config.max_parallelism);
    let env = Arc::new(RunEnv {
      run_id: run_id.clone(),
      context: Arc::clone(&self.context),
      credentials,
      inputs: submission.inputs,
      budget: CostTracker::new(submission.options.budget_ceiling),
      default_max_unit_size: self.config.default_max_unit_size,
      templates: Environment::new(),
    });

    let nodes = Scheduler::new(
      &workflow,
      Arc::clone(&env),
      &self.notifier,
      &cancel,
      max_parallelism,
    )
    .run()
    .await;

    let status = if cancel.is_cancelled() {
      RunStatus::Cancelled
    } else if workflow
      .graph()
      .terminal_nodes()
      .iter()
      .all(|node_id| nodes.get(node_id).is_some_and(|state| state.status == NodeStatus::Done))
    {
      RunStatus::Completed
    } else {
      RunStatus::Failed
    };
    let (usage, estimated_cost) = env.budget.totals();
    let finished_at = Utc::now();

    match status {
      RunStatus::Completed => info!(
        run_id = %run_id,
        total_tokens = usage.total,
        estimated_cost,
        "workflow_completed"
      ),
      RunStatus::Failed => warn!(run_id = %run_id, "workflow_failed"),
      RunStatus::Cancelled => warn!(run_id = %run_id, "workflow_cancelled"),
    }

    let result = ExecutionResult {
      run_id: run_id.clone(),
      workflow_id,
      status,
      nodes,
      usage,
      estimated_cost,
      started_at,
      finished_at,
    };

    if let Some(store) = &self.store {
      if let Err(e) = store.save(&result).await {
        warn!(run_id = %run_id, error = %e, "run_store_save_failed");
      }
    }

    self.notifier.notify(ExecutionEvent::RunFinished {
      run_id,
      status,
      timestamp: finished_at,
    });

    Ok(result)
  }
}
