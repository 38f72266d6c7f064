use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
  Affirmative,
  Negative,
  Neutral,
}

impl Stance {
  fn flipped(self) -> Self {
    match self {
      Stance::Affirmative => Stance::Negative,
      Stance::Negative => Stance::Affirmative,
      Stance::Neutral => Stance::Neutral,
    }
  }

  fn sign(self) -> i32 {
    match self {
      Stance::Affirmative => 1,
      Stance::Negative => -1,
      Stance::Neutral => 0,
    }
  }
}

const AFFIRMATIVE: &[&str] = &[
  "yes",
  "yeah",
  "yep",
  "yup",
  "affirmative",
  "correct",
  "true",
  "absolutely",
  "definitely",
  "certainly",
  "indeed",
  "sure",
  "agreed",
];

/// Intensifiers that turn negative when followed by "not" ("definitely not").
const INTENSIFIERS: &[&str] = &["absolutely", "definitely", "certainly", "sure", "indeed"];

const NEGATIVE: &[&str] = &["no", "nope", "nah", "negative", "false", "incorrect", "wrong"];

const NEGATORS: &[&str] = &[
  "not", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't",
  "shouldn't", "wouldn't", "couldn't", "can't", "cannot", "won't", "mustn't", "hardly",
  "neither", "nor",
];

/// Verbs that carry a preceding negator over to the rest of the clause
/// ("I don't think the answer is yes").
const OPINION_VERBS: &[&str] = &[
  "think", "believe", "say", "expect", "feel", "suppose", "guess", "reckon", "agree",
];

/// "no X" phrases that read as agreement.
const AFFIRMING_NO: &[&str] = &["doubt", "question", "problem"];

const STOPWORDS: &[&str] = &[
  "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "am", "to", "of", "and",
  "or", "but", "in", "on", "at", "by", "for", "with", "as", "it", "its", "it's", "that", "this",
  "these", "those", "i", "you", "we", "they", "he", "she", "me", "us", "them", "my", "your",
  "our", "their", "do", "does", "did", "so", "if", "then", "than", "there", "here", "answer",
  "would", "should", "could", "will", "can", "may", "might", "must", "say", "think", "i'm",
  "that's", "go", "very", "really", "just",
];

#[derive(Debug, Clone)]
pub(crate) struct Token {
  pub word: String,
  pub start: usize,
  pub end: usize,
  /// Index of the clause; punctuation such as `,` or `.` starts a new one.
  pub clause: usize,
}

/// Lowercased words with byte offsets. Apostrophes inside a word are kept
/// so contractions like "don't" stay whole.
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut clause = 0;
  let mut current: Option<(usize, String)> = None;
  let mut chars = text.char_indices().peekable();

  while let Some((i, ch)) = chars.next() {
    let next_is_alnum = chars.peek().is_some_and(|(_, c)| c.is_alphanumeric());
    let is_inner_apostrophe = matches!(ch, '\'' | '’') && current.is_some() && next_is_alnum;

    if ch.is_alphanumeric() || is_inner_apostrophe {
      let (_, word) = current.get_or_insert_with(|| (i, String::new()));
      if is_inner_apostrophe {
        word.push('\'');
      } else {
        word.extend(ch.to_lowercase());
      }
      continue;
    }

    if let Some((start, word)) = current.take() {
      tokens.push(Token {
        word,
        start,
        end: i,
        clause,
      });
    }
    if matches!(ch, '.' | ',' | ';' | ':' | '!' | '?' | '\n') {
      clause += 1;
    }
  }

  if let Some((start, word)) = current.take() {
    tokens.push(Token {
      word,
      start,
      end: text.len(),
      clause,
    });
  }
  tokens
}

fn is_negator(word: &str) -> bool {
  NEGATORS.contains(&word)
}

fn content_form(word: &str) -> Option<&str> {
  let word = word.trim_end_matches("'s");
  let skip = word.is_empty()
    || STOPWORDS.contains(&word)
    || AFFIRMATIVE.contains(&word)
    || NEGATIVE.contains(&word)
    || is_negator(word);
  (!skip).then_some(word)
}

/// One marker that contributed to the stance, as a byte range.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Marker {
  pub start: usize,
  pub end: usize,
  pub stance: Stance,
}

/// A negator not absorbed into a marker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Negation {
  pub start: usize,
  pub end: usize,
  /// First content word after the negator in the same clause ("fail" in
  /// "did not fail").
  pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Reading {
  pub stance: Stance,
  pub markers: Vec<Marker>,
  pub negations: Vec<Negation>,
}

impl Reading {
  /// Content words this output negates.
  pub fn negated_words(&self) -> HashSet<&str> {
    self.negations.iter().filter_map(|n| n.target.as_deref()).collect()
  }
}

/// Polarity of one output. A marker in leading position counts double.
pub(crate) fn read(tokens: &[Token]) -> Reading {
  let mut markers = Vec::new();
  let mut absorbed = HashSet::new();
  let mut score = 0;

  let same_clause = |a: usize, b: usize| tokens[a].clause == tokens[b].clause;
  let clause_first = |i: usize| i == 0 || !same_clause(i - 1, i);
  let clause_last = |i: usize| i + 1 == tokens.len() || !same_clause(i, i + 1);

  for (i, token) in tokens.iter().enumerate() {
    let word = token.word.as_str();
    let next = tokens.get(i + 1).filter(|_| !clause_last(i));

    let (mut stance, mut start, end) = if word == "no" {
      match next {
        Some(n) if AFFIRMING_NO.contains(&n.word.as_str()) => {
          absorbed.insert(i + 1);
          (Stance::Affirmative, token.start, n.end)
        }
        // Elsewhere "no" is a determiner ("no evidence"), not an answer.
        _ if clause_first(i) || clause_last(i) => (Stance::Negative, token.start, token.end),
        _ => continue,
      }
    } else if INTENSIFIERS.contains(&word) && next.is_some_and(|n| n.word == "not") {
      absorbed.insert(i + 1);
      let n = &tokens[i + 1];
      (Stance::Negative, token.start, n.end)
    } else if AFFIRMATIVE.contains(&word) {
      (Stance::Affirmative, token.start, token.end)
    } else if NEGATIVE.contains(&word) {
      (Stance::Negative, token.start, token.end)
    } else {
      continue;
    };

    // A negator in the same clause flips the marker when it is close by, or
    // when it negates an opinion verb that governs the marker.
    if word != "no" {
      let clause_start = (0..i).rev().take_while(|&j| same_clause(j, i)).last().unwrap_or(i);
      let governs = |j: usize| {
        i - j <= 2 || tokens[j + 1..i].iter().any(|t| OPINION_VERBS.contains(&t.word.as_str()))
      };
      if let Some(j) = (clause_start..i)
        .rev()
        .find(|&j| is_negator(&tokens[j].word))
        .filter(|&j| governs(j))
      {
        absorbed.insert(j);
        stance = stance.flipped();
        start = tokens[j].start;
      }
    }

    let weight = if i == 0 { 2 } else { 1 };
    score += stance.sign() * weight;
    markers.push(Marker { start, end, stance });
  }

  let negations = tokens
    .iter()
    .enumerate()
    .filter(|(i, t)| !absorbed.contains(i) && is_negator(&t.word))
    .map(|(i, t)| Negation {
      start: t.start,
      end: t.end,
      target: tokens[i + 1..]
        .iter()
        .take_while(|n| n.clause == t.clause)
        .find_map(|n| content_form(&n.word))
        .map(str::to_string),
    })
    .collect();

  let stance = match score {
    s if s > 0 => Stance::Affirmative,
    s if s < 0 => Stance::Negative,
    _ => Stance::Neutral,
  };

  Reading {
    stance,
    markers,
    negations,
  }
}

/// Words that carry content, for lexical similarity.
pub(crate) fn content_words(tokens: &[Token]) -> HashSet<String> {
  tokens
    .iter()
    .filter_map(|t| content_form(&t.word))
    .map(str::to_string)
    .collect()
}
