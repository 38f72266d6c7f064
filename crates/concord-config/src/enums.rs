use serde::{Deserialize, Serialize};

/// How a generate node feeds an input that the segmenter split into several chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
  /// Submit every chunk in order and join the generated texts.
  #[default]
  SubmitAll,
  /// Submit only the first chunk. The number of chunks left out is recorded
  /// on the node output, so the truncation is always visible.
  FirstOnly,
}

/// How a compare node labels the outputs it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
  /// Stance-aware: outputs asserting the same yes/no answer agree even when
  /// worded differently.
  #[default]
  Consensus,
  /// Agreement additionally requires lexical closeness.
  Lexical,
}
