use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const MIN_LEN: usize = 8;
const MAX_LEN: usize = 512;
const FINGERPRINT_BYTES: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
  #[error("credential is empty")]
  Empty,

  #[error("credential length {0} outside 8..=512")]
  Length(usize),

  #[error("credential contains whitespace or control characters")]
  InvalidCharacters,
}

/// An opaque provider secret.
///
/// Only basic shape is validated. `Debug` and `Display` print the fingerprint,
/// never the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
  secret: String,
  fingerprint: Fingerprint,
}

impl Credential {
  pub fn new(secret: impl Into<String>) -> Result<Self, CredentialError> {
    let secret = secret.into();
    if secret.is_empty() {
      return Err(CredentialError::Empty);
    }
    let len = secret.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
      return Err(CredentialError::Length(len));
    }
    if secret.chars().any(|c| c.is_whitespace() || c.is_control()) {
      return Err(CredentialError::InvalidCharacters);
    }

    let fingerprint = Fingerprint::of(&secret);
    Ok(Self {
      secret,
      fingerprint,
    })
  }

  pub fn fingerprint(&self) -> &Fingerprint {
    &self.fingerprint
  }

  /// The raw secret, for placing into an outgoing request header.
  pub fn expose_secret(&self) -> &str {
    &self.secret
  }

  /// Replace every occurrence of the secret in `text`.
  pub fn scrub(&self, text: &str) -> String {
    text.replace(self.secret.as_str(), "[redacted]")
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Credential({})", self.fingerprint)
  }
}

impl fmt::Display for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "credential:{}", self.fingerprint)
  }
}

/// Truncated SHA-256 of a credential: 12 hex chars, non-reversible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
  fn of(secret: &str) -> Self {
    let digest = Sha256::digest(secret.as_bytes());
    Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
