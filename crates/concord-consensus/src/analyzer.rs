use std::collections::HashSet;

use concord_config::ComparisonMode;
use tracing::debug;

use crate::result::{ComparisonResult, ConsensusLabel, EvidenceSpan};
use crate::similarity::{pairwise, summarize};
use crate::stance::{Reading, Stance, Token, content_words, read, tokenize};

pub const DEFAULT_AGREE_THRESHOLD: f64 = 0.5;

/// Content words an output may carry beyond what all outputs share and still
/// count as the same short answer in consensus mode.
const BRIEF_REMAINDER: usize = 3;

/// Words that attach a condition to an answer ("yes, but only after ...").
const QUALIFIERS: &[&str] = &["but", "only", "unless", "except", "provided", "however", "although"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analyzer {
  mode: ComparisonMode,
  agree_threshold: f64,
}

impl Default for Analyzer {
  fn default() -> Self {
    Self::new(ComparisonMode::default())
  }
}

impl Analyzer {
  pub fn new(mode: ComparisonMode) -> Self {
    Self {
      mode,
      agree_threshold: DEFAULT_AGREE_THRESHOLD,
    }
  }

  pub fn with_agree_threshold(mut self, agree_threshold: f64) -> Self {
    self.agree_threshold = agree_threshold.clamp(0.0, 1.0);
    self
  }

  /// Compare `(source id, text)` pairs. Only successful outputs belong here;
  /// fewer than two yields `insufficient_inputs`.
  pub fn compare<S: AsRef<str>>(&self, outputs: &[(String, S)]) -> ComparisonResult {
    let sources: Vec<String> = outputs.iter().map(|(id, _)| id.clone()).collect();
    let tokens: Vec<_> = outputs.iter().map(|(_, text)| tokenize(text.as_ref())).collect();
    let readings: Vec<Reading> = tokens.iter().map(|t| read(t)).collect();
    let sets: Vec<_> = tokens.iter().map(|t| content_words(t)).collect();
    let matrix = pairwise(&sets);

    if outputs.len() < 2 {
      return ComparisonResult {
        sources,
        pairwise_similarity: matrix,
        consensus_label: ConsensusLabel::InsufficientInputs,
        confidence: 0.0,
        evidence: Vec::new(),
      };
    }

    let n = outputs.len() as f64;
    let (mean, min) = summarize(&matrix);
    let count = |stance: Stance| readings.iter().filter(|r| r.stance == stance).count();
    let affirmative = count(Stance::Affirmative);
    let negative = count(Stance::Negative);
    let decided = affirmative + negative;

    let (label, confidence, evidence) = if affirmative > 0 && negative > 0 {
      (
        ConsensusLabel::Conflict,
        decided as f64 / n,
        self.marker_evidence(outputs, &readings),
      )
    } else if decided == outputs.len() {
      let agree = mean >= self.agree_threshold
        || (self.mode == ComparisonMode::Consensus && brief_and_unqualified(&tokens, &sets));
      if agree {
        (
          ConsensusLabel::Agree,
          0.5 + 0.5 * mean,
          self.marker_evidence(outputs, &readings),
        )
      } else {
        (
          ConsensusLabel::Partial,
          1.0 - mean,
          self.marker_evidence(outputs, &readings),
        )
      }
    } else if decided > 0 {
      (
        ConsensusLabel::Partial,
        1.0 - mean,
        self.marker_evidence(outputs, &readings),
      )
    } else if min >= self.agree_threshold {
      let negated: Vec<_> = readings.iter().map(Reading::negated_words).collect();
      // Same word, opposite negation: "is healthy" vs "is not healthy".
      let opposed = negated.iter().enumerate().any(|(i, words)| {
        words.iter().any(|w| {
          sets
            .iter()
            .zip(&negated)
            .enumerate()
            .any(|(j, (set, other))| j != i && set.contains(*w) && !other.contains(w))
        })
      });
      if opposed {
        (
          ConsensusLabel::Conflict,
          min,
          negation_evidence(outputs, &readings),
        )
      } else if negated.iter().all(|words| *words == negated[0]) {
        (ConsensusLabel::Agree, mean, Vec::new())
      } else {
        // Negations on words the others never use ("did not fail" vs "passed").
        (ConsensusLabel::Partial, 1.0 - min, negation_evidence(outputs, &readings))
      }
    } else {
      (ConsensusLabel::Partial, 1.0 - mean, Vec::new())
    };

    debug!(
      label = ?label,
      confidence,
      inputs = outputs.len(),
      mean_similarity = mean,
      "comparison_completed"
    );

    ComparisonResult {
      sources,
      pairwise_similarity: matrix,
      consensus_label: label,
      confidence: confidence.clamp(0.0, 1.0),
      evidence,
    }
  }

  fn marker_evidence<S: AsRef<str>>(
    &self,
    outputs: &[(String, S)],
    readings: &[Reading],
  ) -> Vec<EvidenceSpan> {
    outputs
      .iter()
      .zip(readings)
      .flat_map(|((source, text), reading)| {
        let text = text.as_ref();
        reading.markers.iter().map(move |m| EvidenceSpan {
          source: source.clone(),
          start: m.start,
          end: m.end,
          text: text[m.start..m.end].to_string(),
          stance: m.stance,
        })
      })
      .collect()
  }
}

fn negation_evidence<S: AsRef<str>>(outputs: &[(String, S)], readings: &[Reading]) -> Vec<EvidenceSpan> {
  outputs
    .iter()
    .zip(readings)
    .flat_map(|((source, text), reading)| {
      let text = text.as_ref();
      reading.negations.iter().map(move |n| EvidenceSpan {
        source: source.clone(),
        start: n.start,
        end: n.end,
        text: text[n.start..n.end].to_string(),
        stance: Stance::Negative,
      })
    })
    .collect()
}

/// Outputs that share a stance but not many words still agree when each adds
/// only a few words of its own and none attaches a condition.
fn brief_and_unqualified(tokens: &[Vec<Token>], sets: &[HashSet<String>]) -> bool {
  let shared = sets
    .iter()
    .skip(1)
    .fold(sets[0].clone(), |acc, set| &acc & set);
  let brief = sets.iter().all(|set| set.difference(&shared).count() <= BRIEF_REMAINDER);
  let qualified = tokens
    .iter()
    .flatten()
    .any(|t| QUALIFIERS.contains(&t.word.as_str()));
  brief && !qualified
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(mode: ComparisonMode, texts: &[&str]) -> ComparisonResult {
    let outputs: Vec<(String, &str)> = texts
      .iter()
      .enumerate()
      .map(|(i, t)| (format!("p{}", i + 1), *t))
      .collect();
    Analyzer::new(mode).compare(&outputs)
  }

  #[test]
  fn test_insufficient_inputs() {
    let none = run(ComparisonMode::Consensus, &[]);
    assert_eq!(none.consensus_label, ConsensusLabel::InsufficientInputs);
    assert_eq!(none.confidence, 0.0);

    let one = run(ComparisonMode::Consensus, &["Yes, proceed."]);
    assert_eq!(one.consensus_label, ConsensusLabel::InsufficientInputs);
    assert_eq!(one.pairwise_similarity, vec![vec![1.0]]);
  }

  #[test]
  fn test_opposed_answers_conflict_with_evidence() {
    let result = run(ComparisonMode::Consensus, &["Yes, proceed.", "No, do not proceed."]);

    assert_eq!(result.consensus_label, ConsensusLabel::Conflict);
    assert_eq!(result.confidence, 1.0);
    let texts: Vec<(&str, &str)> = result
      .evidence
      .iter()
      .map(|e| (e.source.as_str(), e.text.as_str()))
      .collect();
    assert_eq!(texts, vec![("p1", "Yes"), ("p2", "No")]);
  }

  #[test]
  fn test_lexical_mode_requires_overlap() {
    let texts = ["The answer is yes, ship the release.", "Yes, definitely."];
    assert_eq!(
      run(ComparisonMode::Consensus, &texts).consensus_label,
      ConsensusLabel::Agree
    );
    assert_eq!(
      run(ComparisonMode::Lexical, &texts).consensus_label,
      ConsensusLabel::Partial
    );
  }

  #[test]
  fn test_neutral_negation_mismatch_is_conflict() {
    let result = run(
      ComparisonMode::Consensus,
      &["The server is healthy.", "The server is not healthy."],
    );
    assert_eq!(result.consensus_label, ConsensusLabel::Conflict);
    assert_eq!(result.evidence.len(), 1);
    assert_eq!(result.evidence[0].text, "not");
  }

  #[test]
  fn test_neutral_overlap_and_divergence() {
    let close = run(
      ComparisonMode::Consensus,
      &["Deploy the canary build first.", "Deploy the canary build first, then wait."],
    );
    assert_eq!(close.consensus_label, ConsensusLabel::Agree);

    let apart = run(
      ComparisonMode::Consensus,
      &["Rotate the database credentials.", "Increase the cache size."],
    );
    assert_eq!(apart.consensus_label, ConsensusLabel::Partial);
  }

  #[test]
  fn test_same_stance_with_unrelated_content_is_partial() {
    let result = run(
      ComparisonMode::Consensus,
      &[
        "Yes, ship the release tonight.",
        "Yes, but only after rewriting the entire storage engine in Go.",
      ],
    );
    assert_eq!(result.consensus_label, ConsensusLabel::Partial);
    assert_eq!(result.pairwise_similarity[0][1], 0.0);

    let conditional = run(ComparisonMode::Consensus, &["Yes.", "Yes, but only if the tests pass."]);
    assert_eq!(conditional.consensus_label, ConsensusLabel::Partial);
  }

  #[test]
  fn test_unshared_negation_is_partial_not_conflict() {
    let result = run(
      ComparisonMode::Consensus,
      &[
        "The build did not fail; the service is healthy and running.",
        "The build passed; the service is healthy and running.",
      ],
    );
    assert_eq!(result.consensus_label, ConsensusLabel::Partial);
    assert_eq!(result.evidence.len(), 1);
    assert_eq!(result.evidence[0].text, "not");

    let both = run(
      ComparisonMode::Consensus,
      &["The server is not down.", "The server is not down right now."],
    );
    assert_eq!(both.consensus_label, ConsensusLabel::Agree);
  }

  #[test]
  fn test_stance_with_neutral_is_partial() {
    let result = run(
      ComparisonMode::Consensus,
      &["Yes, ship it.", "It depends on the test results."],
    );
    assert_eq!(result.consensus_label, ConsensusLabel::Partial);
  }
}
