use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::ProviderError;
use crate::types::{GenerationResult, Pricing};

/// One provider implementation behind the uniform adapter contract.
///
/// Implementations must not apply their own timeouts or retries; the
/// resilience layer owns both. Dropping the returned future cancels the call.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Name used for logging and as part of breaker and rate keys.
  fn name(&self) -> &str;

  fn pricing(&self) -> Pricing {
    Pricing::default()
  }

  async fn generate(
    &self,
    model: &str,
    prompt: &str,
    credential: &Credential,
  ) -> Result<GenerationResult, ProviderError>;
}
