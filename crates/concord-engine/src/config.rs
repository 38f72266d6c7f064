use std::collections::{BTreeMap, HashMap};

use concord_provider::ProviderSettings;
use concord_resilience::{BreakerConfig, RateConfig, TimeoutConfig};
use serde::{Deserialize, Serialize};

/// Engine-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Nodes running at once within one run, unless a submission overrides it.
  pub max_parallelism: usize,
  /// Runs executing at once; further submissions wait for a slot.
  pub max_concurrent_runs: usize,
  /// Bytes per chunk for generate nodes without their own `max_unit_size`.
  pub default_max_unit_size: usize,
  pub breaker: BreakerConfig,
  pub rate: RateConfig,
  /// Per-provider replacements for `rate`.
  pub rate_overrides: HashMap<String, RateConfig>,
  pub timeout: TimeoutConfig,
  pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_parallelism: 4,
      max_concurrent_runs: 8,
      default_max_unit_size: 8_000,
      breaker: BreakerConfig::default(),
      rate: RateConfig::default(),
      rate_overrides: HashMap::new(),
      timeout: TimeoutConfig::default(),
      providers: BTreeMap::new(),
    }
  }
}
