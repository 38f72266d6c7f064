//! Per-node state and the final result of a run.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use concord_consensus::ComparisonResult;
use concord_provider::{ProviderErrorKind, TokenUsage};
use concord_resilience::CallError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Pending,
  Running,
  Done,
  Failed,
  Skipped,
}

impl NodeStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, NodeStatus::Done | NodeStatus::Failed | NodeStatus::Skipped)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Completed,
  Failed,
  Cancelled,
}

/// Why a node did not finish `done`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
  #[error("circuit open")]
  CircuitOpen { retry_after_ms: Option<u64> },

  #[error("rate limited")]
  RateLimited { retry_after_ms: Option<u64> },

  #[error("payload of {size} bytes exceeds {limit}")]
  PayloadTooLarge { size: usize, limit: usize },

  #[error("timed out after {after_ms}ms")]
  Timeout { after_ms: u64 },

  #[error("provider error ({error:?}): {message}")]
  Provider {
    error: ProviderErrorKind,
    message: String,
  },

  #[error("cancelled")]
  Cancelled,

  #[error("budget of {ceiling} exhausted ({spent} spent)")]
  BudgetExceeded { spent: f64, ceiling: f64 },

  #[error("no input supplied")]
  MissingInput,

  #[error("no credential for provider '{provider}'")]
  MissingCredential { provider: String },

  #[error("invalid credential for provider '{provider}': {message}")]
  InvalidCredential { provider: String, message: String },

  #[error("prompt template failed: {message}")]
  Template { message: String },

  #[error("upstream node '{node_id}' did not complete")]
  UpstreamFailed { node_id: String },

  #[error("internal error: {message}")]
  Internal { message: String },
}

fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<CallError> for FailureReason {
  fn from(err: CallError) -> Self {
    match err {
      CallError::CircuitOpen { retry_after, .. } => FailureReason::CircuitOpen {
        retry_after_ms: Some(millis(retry_after)),
      },
      CallError::RateLimited { retry_after } => FailureReason::RateLimited {
        retry_after_ms: Some(millis(retry_after)),
      },
      CallError::ExceedsCapacity { .. } => FailureReason::RateLimited {
        retry_after_ms: None,
      },
      CallError::PayloadTooLarge { size, limit } => FailureReason::PayloadTooLarge { size, limit },
      CallError::Timeout { after } => FailureReason::Timeout {
        after_ms: millis(after),
      },
      CallError::Provider(err) => FailureReason::Provider {
        error: err.kind(),
        message: err.to_string(),
      },
    }
  }
}

/// Output of one generate node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
  pub provider: String,
  pub model: String,
  /// Generated texts of every submitted chunk, joined with `"\n"`.
  pub text: String,
  pub usage: TokenUsage,
  pub latency_ms: u64,
  pub estimated_cost: f64,
  /// Chunks submitted to the provider.
  pub chunks: usize,
  /// Chunks left out under the first-only policy.
  pub truncated_chunks: usize,
}

/// Output of one compare node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutput {
  /// Texts that were compared, keyed by upstream node id.
  pub inputs: BTreeMap<String, String>,
  /// Upstream nodes that produced nothing to compare.
  pub missing: Vec<String>,
  pub result: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NodeOutput {
  Text(String),
  Generation(GenerationOutput),
  Comparison(ComparisonOutput),
  /// Final artifact: every completed predecessor's output, keyed by node id.
  Sink(BTreeMap<String, NodeOutput>),
}

impl NodeOutput {
  /// Plain-text view used when this output feeds a generate node.
  pub fn text(&self) -> String {
    match self {
      NodeOutput::Text(text) => text.clone(),
      NodeOutput::Generation(generation) => generation.text.clone(),
      NodeOutput::Comparison(comparison) => comparison.result.consensus_label.as_str().to_string(),
      NodeOutput::Sink(entries) => entries
        .values()
        .map(NodeOutput::text)
        .collect::<Vec<_>>()
        .join("\n\n"),
    }
  }

  pub fn as_generation(&self) -> Option<&GenerationOutput> {
    match self {
      NodeOutput::Generation(generation) => Some(generation),
      _ => None,
    }
  }

  pub fn as_comparison(&self) -> Option<&ComparisonOutput> {
    match self {
      NodeOutput::Comparison(comparison) => Some(comparison),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionState {
  pub node_id: String,
  pub status: NodeStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<NodeOutput>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<FailureReason>,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl NodeExecutionState {
  pub(crate) fn pending(node_id: &str) -> Self {
    Self {
      node_id: node_id.to_string(),
      status: NodeStatus::Pending,
      output: None,
      reason: None,
      started_at: None,
      finished_at: None,
    }
  }
}

/// Result of a complete run. Every node of the workflow has an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
  pub run_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  pub nodes: BTreeMap<String, NodeExecutionState>,
  pub usage: TokenUsage,
  pub estimated_cost: f64,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
  pub fn node(&self, node_id: &str) -> Option<&NodeExecutionState> {
    self.nodes.get(node_id)
  }

  pub fn output(&self, node_id: &str) -> Option<&NodeOutput> {
    self.nodes.get(node_id).and_then(|state| state.output.as_ref())
  }
}
