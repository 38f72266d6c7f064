use std::fmt;

use concord_provider::Fingerprint;

/// Unit of isolation for breaker and rate state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResilienceKey {
  pub provider: String,
  pub fingerprint: Fingerprint,
}

impl ResilienceKey {
  pub fn new(provider: impl Into<String>, fingerprint: &Fingerprint) -> Self {
    Self {
      provider: provider.into(),
      fingerprint: fingerprint.clone(),
    }
  }
}

impl fmt::Display for ResilienceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.provider, self.fingerprint)
  }
}
