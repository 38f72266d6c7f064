use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set every upstream failure is mapped onto.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
  #[error("authentication rejected: {0}")]
  Auth(String),

  #[error("rate limited upstream: {message}")]
  RateLimitedUpstream {
    retry_after: Option<Duration>,
    message: String,
  },

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(String),

  #[error("unknown provider error: {0}")]
  Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
  Auth,
  RateLimitedUpstream,
  InvalidRequest,
  UpstreamUnavailable,
  Unknown,
}

impl ProviderError {
  pub fn kind(&self) -> ProviderErrorKind {
    match self {
      ProviderError::Auth(_) => ProviderErrorKind::Auth,
      ProviderError::RateLimitedUpstream { .. } => ProviderErrorKind::RateLimitedUpstream,
      ProviderError::InvalidRequest(_) => ProviderErrorKind::InvalidRequest,
      ProviderError::UpstreamUnavailable(_) => ProviderErrorKind::UpstreamUnavailable,
      ProviderError::Unknown(_) => ProviderErrorKind::Unknown,
    }
  }

  /// Transport-level failures worth one more attempt.
  pub fn is_transient(&self) -> bool {
    matches!(self, ProviderError::UpstreamUnavailable(_))
  }

  /// Whether the failure says something about the health of the
  /// (provider, credential) pair. A malformed request does not.
  pub fn trips_breaker(&self) -> bool {
    !matches!(self, ProviderError::InvalidRequest(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classification() {
    let unavailable = ProviderError::UpstreamUnavailable("502".into());
    assert!(unavailable.is_transient());
    assert!(unavailable.trips_breaker());

    let auth = ProviderError::Auth("401".into());
    assert!(!auth.is_transient());
    assert!(auth.trips_breaker());

    let invalid = ProviderError::InvalidRequest("400".into());
    assert!(!invalid.is_transient());
    assert!(!invalid.trips_breaker());
    assert_eq!(invalid.kind(), ProviderErrorKind::InvalidRequest);
  }
}
