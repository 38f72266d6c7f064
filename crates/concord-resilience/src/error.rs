use std::time::Duration;

use concord_provider::ProviderError;
use thiserror::Error;

/// Failure of one provider call as seen through the resilience chain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallError {
  /// Fast-fail, no attempt was made.
  #[error("circuit open for {key}, retry after {retry_after:?}")]
  CircuitOpen { key: String, retry_after: Duration },

  /// Fast-fail, no attempt was made.
  #[error("rate limited, retry after {retry_after:?}")]
  RateLimited { retry_after: Duration },

  #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
  PayloadTooLarge { size: usize, limit: usize },

  #[error("cost {cost} exceeds bucket capacity {capacity}")]
  ExceedsCapacity { cost: u32, capacity: u32 },

  /// An attempt was made and cancelled when the deadline passed.
  #[error("call timed out after {after:?}")]
  Timeout { after: Duration },

  #[error(transparent)]
  Provider(#[from] ProviderError),
}

impl CallError {
  /// Whether the breaker should count this outcome as a failure.
  pub fn trips_breaker(&self) -> bool {
    match self {
      CallError::Timeout { .. } => true,
      CallError::Provider(err) => err.trips_breaker(),
      _ => false,
    }
  }

  pub fn retry_after(&self) -> Option<Duration> {
    match self {
      CallError::CircuitOpen { retry_after, .. } | CallError::RateLimited { retry_after } => {
        Some(*retry_after)
      }
      CallError::Provider(ProviderError::RateLimitedUpstream { retry_after, .. }) => *retry_after,
      _ => None,
    }
  }
}
