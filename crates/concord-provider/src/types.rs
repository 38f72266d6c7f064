use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
  pub prompt: u64,
  pub completion: u64,
  pub total: u64,
}

impl TokenUsage {
  pub fn new(prompt: u64, completion: u64) -> Self {
    Self {
      prompt,
      completion,
      total: prompt + completion,
    }
  }

  pub fn add(&mut self, other: &TokenUsage) {
    self.prompt += other.prompt;
    self.completion += other.completion;
    self.total += other.total;
  }
}

/// A normalized successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
  pub text: String,
  pub usage: TokenUsage,
  pub latency_ms: u64,
}

/// Price per 1000 tokens, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
  #[serde(default)]
  pub prompt_per_1k: f64,
  #[serde(default)]
  pub completion_per_1k: f64,
}

impl Pricing {
  pub fn cost(&self, usage: &TokenUsage) -> f64 {
    (usage.prompt as f64 / 1000.0) * self.prompt_per_1k
      + (usage.completion as f64 / 1000.0) * self.completion_per_1k
  }
}
