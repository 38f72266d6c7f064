use serde::{Deserialize, Serialize};

/// Per-run execution options supplied with a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
  /// Overrides the engine's default bound on concurrently running nodes.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_parallelism: Option<usize>,

  /// Ceiling on the total estimated cost of the run, in USD.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub budget_ceiling: Option<f64>,
}
