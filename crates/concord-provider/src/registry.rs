use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::anthropic::{ANTHROPIC_BASE_URL, AnthropicProvider};
use crate::openai::{OPENAI_BASE_URL, OpenAiProvider};
use crate::provider::Provider;
use crate::types::Pricing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
  /// OpenAI chat completions, or any server speaking the same protocol.
  Openai,
  Anthropic,
}

/// How to reach one named provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
  pub kind: ProviderKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,
  #[serde(default)]
  pub pricing: Pricing,
}

impl ProviderSettings {
  pub fn build(&self, name: &str) -> Arc<dyn Provider> {
    match self.kind {
      ProviderKind::Openai => Arc::new(
        OpenAiProvider::new(name, self.base_url.as_deref().unwrap_or(OPENAI_BASE_URL))
          .with_pricing(self.pricing),
      ),
      ProviderKind::Anthropic => Arc::new(
        AnthropicProvider::new(name, self.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL))
          .with_pricing(self.pricing),
      ),
    }
  }
}

/// Named providers available to generate nodes.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
  providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_settings(settings: &BTreeMap<String, ProviderSettings>) -> Self {
    let mut registry = Self::new();
    for (name, entry) in settings {
      registry.register(name.clone(), entry.build(name));
    }
    registry
  }

  /// Register a provider under `name`, replacing any previous entry.
  pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
    self.providers.insert(name.into(), provider);
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
    self.providers.get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.providers.contains_key(name)
  }

  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
    names.sort_unstable();
    names
  }
}
