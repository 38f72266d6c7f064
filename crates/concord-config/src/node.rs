use serde::{Deserialize, Serialize};

use crate::enums::{ChunkPolicy, ComparisonMode};
use crate::input::PromptTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub node_id: String,
  #[serde(flatten)]
  pub node_type: NodeType,
  /// Run even when a predecessor failed, treating its input as empty.
  /// Defaults to `true` for compare nodes and `false` for everything else.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub best_effort: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeType {
  /// Entry node whose text comes from the submission inputs.
  Source {
    /// Used when the submission carries no input for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_text: Option<String>,
  },
  /// Fetches a text generation from one provider.
  Generate {
    /// Provider name, as configured on the engine.
    provider: String,
    model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_template: Option<PromptTemplate>,
    /// Largest input unit, in bytes, submitted in one call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_unit_size: Option<usize>,
    #[serde(default)]
    chunk_policy: ChunkPolicy,
  },
  /// Reduces upstream generations to an agreement/conflict verdict.
  Compare {
    #[serde(default)]
    mode: ComparisonMode,
  },
  /// Terminal node collecting the final artifact.
  Sink,
}

impl NodeDef {
  /// Effective best-effort flag after applying the per-kind default.
  pub fn is_best_effort(&self) -> bool {
    self
      .best_effort
      .unwrap_or(matches!(self.node_type, NodeType::Compare { .. }))
  }
}
