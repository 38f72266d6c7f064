//! Credential lookup for generate nodes.
//!
//! Credentials supplied with a submission win. Otherwise the engine asks its
//! [`CredentialStore`] at call time, so a rotated secret is picked up by the
//! next call without restarting anything.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use concord_provider::Credential;

use crate::error::ExecutionError;
use crate::result::FailureReason;

/// Supplies the current credential for a provider. Nothing is persisted here.
pub trait CredentialStore: Send + Sync {
  fn credential(&self, provider: &str) -> Option<String>;
}

/// Reads `CONCORD_<PROVIDER>_API_KEY`, with the provider name uppercased and
/// non-alphanumeric characters replaced by `_`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
  pub fn variable_name(provider: &str) -> String {
    let normalized: String = provider
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() {
          c.to_ascii_uppercase()
        } else {
          '_'
        }
      })
      .collect();
    format!("CONCORD_{}_API_KEY", normalized)
  }
}

impl CredentialStore for EnvCredentialStore {
  fn credential(&self, provider: &str) -> Option<String> {
    std::env::var(Self::variable_name(provider)).ok()
  }
}

/// In-process store whose entries can be replaced while runs are active.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
  secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&self, provider: impl Into<String>, secret: impl Into<String>) {
    self
      .secrets
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(provider.into(), secret.into());
  }
}

impl CredentialStore for MemoryCredentialStore {
  fn credential(&self, provider: &str) -> Option<String> {
    self
      .secrets
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(provider)
      .cloned()
  }
}

/// Credentials validated from a submission.
#[derive(Debug, Clone, Default)]
pub(crate) struct SuppliedCredentials {
  credentials: HashMap<String, Credential>,
}

impl SuppliedCredentials {
  pub fn validate(raw: &HashMap<String, String>) -> Result<Self, ExecutionError> {
    let mut credentials = HashMap::with_capacity(raw.len());
    for (provider, secret) in raw {
      let credential =
        Credential::new(secret.as_str()).map_err(|e| ExecutionError::InvalidCredential {
          provider: provider.clone(),
          message: e.to_string(),
        })?;
      credentials.insert(provider.clone(), credential);
    }
    Ok(Self { credentials })
  }

  pub fn resolve(
    &self,
    provider: &str,
    store: &dyn CredentialStore,
  ) -> Result<Credential, FailureReason> {
    if let Some(credential) = self.credentials.get(provider) {
      return Ok(credential.clone());
    }
    let secret = store
      .credential(provider)
      .ok_or_else(|| FailureReason::MissingCredential {
        provider: provider.to_string(),
      })?;
    Credential::new(secret).map_err(|e| FailureReason::InvalidCredential {
      provider: provider.to_string(),
      message: e.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_env_variable_name() {
    assert_eq!(
      EnvCredentialStore::variable_name("open-ai"),
      "CONCORD_OPEN_AI_API_KEY"
    );
  }

  #[test]
  fn test_supplied_wins_over_store() {
    let mut raw = HashMap::new();
    raw.insert("p1".to_string(), "supplied-secret-1".to_string());
    let supplied = SuppliedCredentials::validate(&raw).unwrap();

    let store = MemoryCredentialStore::new();
    store.set("p1", "stored-secret-1");
    store.set("p2", "stored-secret-2");

    let p1 = supplied.resolve("p1", &store).unwrap();
    assert_eq!(p1.expose_secret(), "supplied-secret-1");
    let p2 = supplied.resolve("p2", &store).unwrap();
    assert_eq!(p2.expose_secret(), "stored-secret-2");
  }

  #[test]
  fn test_rotation_is_seen_on_next_lookup() {
    let supplied = SuppliedCredentials::default();
    let store = MemoryCredentialStore::new();
    store.set("p1", "first-secret-1");
    let before = supplied.resolve("p1", &store).unwrap();
    store.set("p1", "second-secret-2");
    let after = supplied.resolve("p1", &store).unwrap();

    assert_ne!(before.fingerprint(), after.fingerprint());
  }

  #[test]
  fn test_missing_and_malformed() {
    let supplied = SuppliedCredentials::default();
    let store = MemoryCredentialStore::new();
    assert_eq!(
      supplied.resolve("p1", &store),
      Err(FailureReason::MissingCredential {
        provider: "p1".to_string()
      })
    );

    store.set("p1", "bad key");
    assert!(matches!(
      supplied.resolve("p1", &store),
      Err(FailureReason::InvalidCredential { .. })
    ));

    let mut raw = HashMap::new();
    raw.insert("p1".to_string(), "tiny".to_string());
    assert!(matches!(
      SuppliedCredentials::validate(&raw),
      Err(ExecutionError::InvalidCredential { .. })
    ));
  }
}
