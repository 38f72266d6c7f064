//! Concord Consensus
//!
//! Reduces N provider outputs to one verdict: `agree`, `conflict`, `partial`
//! or `insufficient_inputs`.
//!
//! Two signals are combined:
//!
//! - **Stance**: each output's yes/no polarity, from affirmative and negative
//!   markers with negation scoped to the marker's clause ("not correct",
//!   "definitely not", "I don't think ... yes") and a few idioms ("no doubt").
//! - **Lexical similarity**: Jaccard overlap of content words, with stop
//!   words and stance vocabulary removed so wording differences in the
//!   answer itself do not dominate.
//!
//! Opposed stances are a conflict regardless of wording. Shared stance is
//! agreement when the mean similarity reaches the agree threshold. In
//! [`ComparisonMode::Consensus`] short answers that each add only a few words
//! of their own and attach no condition ("but only after ...") also agree;
//! anything else with a shared stance is `partial`.
//!
//! Without any stance, near-identical outputs where one negates a word the
//! other asserts are a conflict. Negations on words the others never use
//! ("did not fail" vs "passed") give `partial`, otherwise similarity alone
//! decides between `agree` and `partial`.

mod analyzer;
mod result;
mod similarity;
mod stance;

pub use analyzer::{Analyzer, DEFAULT_AGREE_THRESHOLD};
pub use concord_config::ComparisonMode;
pub use result::{ComparisonResult, ConsensusLabel, EvidenceSpan};
pub use stance::Stance;

use concord_provider::GenerationResult;

/// Compare generations with the default analyzer. Sources are labelled by
/// position.
pub fn compare(outputs: &[GenerationResult]) -> ComparisonResult {
  let labelled: Vec<(String, &str)> = outputs
    .iter()
    .enumerate()
    .map(|(i, output)| (i.to_string(), output.text.as_str()))
    .collect();
  Analyzer::default().compare(&labelled)
}
