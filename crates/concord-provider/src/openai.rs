use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use crate::credential::Credential;
use crate::error::ProviderError;
use crate::http::{classify_transport, error_from_response};
use crate::provider::Provider;
use crate::types::{GenerationResult, Pricing, TokenUsage};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Adapter for the OpenAI chat completions API and compatible servers.
pub struct OpenAiProvider {
  name: String,
  base_url: String,
  pricing: Pricing,
  client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<Choice>,
  usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: u64,
  #[serde(default)]
  completion_tokens: u64,
}

impl OpenAiProvider {
  pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      pricing: Pricing::default(),
      client: Client::new(),
    }
  }

  pub fn with_pricing(mut self, pricing: Pricing) -> Self {
    self.pricing = pricing;
    self
  }
}

#[async_trait]
impl Provider for OpenAiProvider {
  fn name(&self) -> &str {
    &self.name
  }

  fn pricing(&self) -> Pricing {
    self.pricing
  }

  async fn generate(
    &self,
    model: &str,
    prompt: &str,
    credential: &Credential,
  ) -> Result<GenerationResult, ProviderError> {
    let started = Instant::now();
    let body = serde_json::json!({
      "model": model,
      "messages": [{ "role": "user", "content": prompt }],
    });

    let response = self
      .client
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(credential.expose_secret())
      .json(&body)
      .send()
      .await
      .map_err(|e| classify_transport(e, credential))?;

    if !response.status().is_success() {
      return Err(error_from_response(response, credential).await);
    }

    let parsed: ChatResponse = response
      .json()
      .await
      .map_err(|e| classify_transport(e, credential))?;

    let text = parsed
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or_else(|| ProviderError::Unknown("response contained no message content".into()))?;

    let usage = parsed
      .usage
      .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
      .unwrap_or_default();
    let latency_ms = started.elapsed().as_millis() as u64;

    debug!(
      provider = %self.name,
      model = %model,
      fingerprint = %credential.fingerprint(),
      latency_ms,
      total_tokens = usage.total,
      "provider_generation_completed"
    );

    Ok(GenerationResult {
      text,
      usage,
      latency_ms,
    })
  }
}
