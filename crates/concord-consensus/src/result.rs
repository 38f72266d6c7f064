use serde::{Deserialize, Serialize};

use crate::stance::Stance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLabel {
  Agree,
  Conflict,
  Partial,
  InsufficientInputs,
}

impl ConsensusLabel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ConsensusLabel::Agree => "agree",
      ConsensusLabel::Conflict => "conflict",
      ConsensusLabel::Partial => "partial",
      ConsensusLabel::InsufficientInputs => "insufficient_inputs",
    }
  }
}

/// A stretch of one output that supported the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSpan {
  pub source: String,
  /// Byte offsets into that source's text.
  pub start: usize,
  pub end: usize,
  pub text: String,
  pub stance: Stance,
}

/// Verdict over a set of outputs. Recomputed from scratch on every comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
  /// Source ids, in the order used by the matrix.
  pub sources: Vec<String>,
  pub pairwise_similarity: Vec<Vec<f64>>,
  pub consensus_label: ConsensusLabel,
  /// In `[0, 1]`; always 0 for `insufficient_inputs`.
  pub confidence: f64,
  pub evidence: Vec<EvidenceSpan>,
}
