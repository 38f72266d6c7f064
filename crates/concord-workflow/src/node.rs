use concord_config::{ChunkPolicy, ComparisonMode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "{{ input }}";

/// A validated node, immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub kind: NodeKind,
  pub best_effort: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
  Source { default_text: Option<String> },
  Generate(GenerateSpec),
  Compare { mode: ComparisonMode },
  Sink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSpec {
  pub provider: String,
  pub model: String,
  pub prompt_template: String,
  /// `None` falls back to the engine default.
  pub max_unit_size: Option<usize>,
  pub chunk_policy: ChunkPolicy,
}

impl NodeKind {
  pub fn name(&self) -> &'static str {
    match self {
      NodeKind::Source { .. } => "source",
      NodeKind::Generate(_) => "generate",
      NodeKind::Compare { .. } => "compare",
      NodeKind::Sink => "sink",
    }
  }

  pub fn is_source(&self) -> bool {
    matches!(self, NodeKind::Source { .. })
  }
}
