use concord_workflow::WorkflowError;
use thiserror::Error;

/// Errors that reject a submission before any node runs.
///
/// Failures of individual nodes are not errors; they are recorded as a
/// [`FailureReason`](crate::FailureReason) on that node's state.
#[derive(Debug, Error)]
pub enum ExecutionError {
  #[error("invalid workflow graph: {0}")]
  GraphInvalid(#[from] WorkflowError),

  #[error("invalid credential for provider '{provider}': {message}")]
  InvalidCredential { provider: String, message: String },

  #[error("workflow references unknown provider '{0}'")]
  UnknownProvider(String),

  #[error("internal engine error: {0}")]
  Internal(String),
}
