use std::sync::Arc;

use concord_provider::ProviderRegistry;
use concord_resilience::{BreakerRegistry, RateGovernor, TimeoutController};

use crate::config::EngineConfig;
use crate::credentials::{CredentialStore, EnvCredentialStore};

/// Process-lifetime tables shared by every run of one engine.
///
/// Built once at startup and dropped at shutdown. Tests build their own so
/// breaker and rate state never leaks between them.
pub struct ExecutionContext {
  pub providers: ProviderRegistry,
  pub breakers: BreakerRegistry,
  pub governor: RateGovernor,
  pub timeouts: TimeoutController,
  pub credentials: Arc<dyn CredentialStore>,
}

impl ExecutionContext {
  pub fn new(config: &EngineConfig, providers: ProviderRegistry) -> Self {
    Self {
      providers,
      breakers: BreakerRegistry::new(config.breaker.clone()),
      governor: RateGovernor::new(config.rate.clone()).with_overrides(config.rate_overrides.clone()),
      timeouts: TimeoutController::new(config.timeout.clone()),
      credentials: Arc::new(EnvCredentialStore),
    }
  }

  /// Build providers from `config.providers`.
  pub fn from_config(config: &EngineConfig) -> Self {
    Self::new(config, ProviderRegistry::from_settings(&config.providers))
  }

  pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
    self.credentials = store;
    self
  }
}
