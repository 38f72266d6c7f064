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

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter for the Anthropic messages API.
pub struct AnthropicProvider {
  name: String,
  base_url: String,
  max_tokens: u32,
  pricing: Pricing,
  client: Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
  #[serde(default)]
  content: Vec<ContentBlock>,
  usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
  #[serde(default)]
  input_tokens: u64,
  #[serde(default)]
  output_tokens: u64,
}

impl AnthropicProvider {
  pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      max_tokens: DEFAULT_MAX_TOKENS,
      pricing: Pricing::default(),
      client: Client::new(),
    }
  }

  pub fn with_pricing(mut self, pricing: Pricing) -> Self {
    self.pricing = pricing;
    self
  }

  pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
    self.max_tokens = max_tokens;
    self
  }
}

#[async_trait]
impl Provider for AnthropicProvider {
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
      "max_tokens": self.max_tokens,
      "messages": [{ "role": "user", "content": prompt }],
    });

    let response = self
      .client
      .post(format!("{}/messages", self.base_url))
      .header("x-api-key", credential.expose_secret())
      .header("anthropic-version", ANTHROPIC_VERSION)
      .json(&body)
      .send()
      .await
      .map_err(|e| classify_transport(e, credential))?;

    if !response.status().is_success() {
      return Err(error_from_response(response, credential).await);
    }

    let parsed: MessagesResponse = response
      .json()
      .await
      .map_err(|e| classify_transport(e, credential))?;

    let text: String = parsed
      .content
      .iter()
      .filter(|block| block.kind == "text")
      .map(|block| block.text.as_str())
      .collect();
    if text.is_empty() {
      return Err(ProviderError::Unknown(
        "response contained no text content".into(),
      ));
    }

    let usage = parsed
      .usage
      .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
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
