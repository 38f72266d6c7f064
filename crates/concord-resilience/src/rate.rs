use std::collections::HashMap;
use std::time::Duration;

use concord_provider::Fingerprint;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::error::CallError;
use crate::key::ResilienceKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
  /// Burst size and bucket ceiling.
  pub capacity: u32,
  pub refill_per_sec: f64,
  /// Requests larger than this are rejected before admission.
  pub max_payload_bytes: usize,
}

impl Default for RateConfig {
  fn default() -> Self {
    Self {
      capacity: 10,
      refill_per_sec: 1.0,
      max_payload_bytes: 1024 * 1024,
    }
  }
}

/// Token bucket for one key.
#[derive(Debug)]
struct TokenBucket {
  tokens: f64,
  capacity: f64,
  refill_rate: f64,
  last_refill: Instant,
}

impl TokenBucket {
  fn new(config: &RateConfig, now: Instant) -> Self {
    Self {
      tokens: config.capacity as f64,
      capacity: config.capacity as f64,
      refill_rate: config.refill_per_sec.max(0.0),
      last_refill: now,
    }
  }

  fn refill(&mut self, now: Instant) {
    let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
    self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
    self.last_refill = now;
  }

  fn time_until(&self, cost: f64) -> Duration {
    let needed = cost - self.tokens;
    if needed <= 0.0 {
      return Duration::ZERO;
    }
    if self.refill_rate <= 0.0 {
      return Duration::MAX;
    }
    Duration::try_from_secs_f64(needed / self.refill_rate).unwrap_or(Duration::MAX)
  }
}

/// Proof of admission. Tokens are not returned when it is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Permit {
  pub cost: u32,
  pub remaining: f64,
}

/// Token-bucket admission control keyed by (provider, fingerprint).
///
/// Never waits: an insufficient bucket yields `CallError::RateLimited` with a
/// retry-after hint and the caller decides what to do.
#[derive(Debug, Default)]
pub struct RateGovernor {
  default: RateConfig,
  overrides: HashMap<String, RateConfig>,
  buckets: DashMap<ResilienceKey, TokenBucket>,
}

impl RateGovernor {
  pub fn new(default: RateConfig) -> Self {
    Self {
      default,
      overrides: HashMap::new(),
      buckets: DashMap::new(),
    }
  }

  pub fn with_overrides(mut self, overrides: HashMap<String, RateConfig>) -> Self {
    self.overrides = overrides;
    self
  }

  pub fn config_for(&self, provider: &str) -> &RateConfig {
    self.overrides.get(provider).unwrap_or(&self.default)
  }

  /// Check payload size, then acquire. An oversized payload never consumes tokens.
  pub fn admit(
    &self,
    provider: &str,
    fingerprint: &Fingerprint,
    payload_bytes: usize,
    cost: u32,
  ) -> Result<Permit, CallError> {
    let limit = self.config_for(provider).max_payload_bytes;
    if payload_bytes > limit {
      return Err(CallError::PayloadTooLarge {
        size: payload_bytes,
        limit,
      });
    }
    self.acquire(provider, fingerprint, cost)
  }

  /// Refill, check and decrement as one step under the key's shard lock.
  pub fn acquire(
    &self,
    provider: &str,
    fingerprint: &Fingerprint,
    cost: u32,
  ) -> Result<Permit, CallError> {
    let config = self.config_for(provider);
    if cost > config.capacity {
      return Err(CallError::ExceedsCapacity {
        cost,
        capacity: config.capacity,
      });
    }

    let key = ResilienceKey::new(provider, fingerprint);
    let now = Instant::now();
    let mut bucket = self
      .buckets
      .entry(key)
      .or_insert_with(|| TokenBucket::new(config, now));

    bucket.refill(now);
    let cost_f = cost as f64;
    if bucket.tokens >= cost_f {
      bucket.tokens -= cost_f;
      Ok(Permit {
        cost,
        remaining: bucket.tokens,
      })
    } else {
      let retry_after = bucket.time_until(cost_f);
      debug!(
        provider = %provider,
        fingerprint = %fingerprint,
        retry_after_ms = retry_after.as_millis() as u64,
        "rate_limited"
      );
      Err(CallError::RateLimited { retry_after })
    }
  }

  /// Tokens currently available for a key, without consuming any.
  pub fn available(&self, provider: &str, fingerprint: &Fingerprint) -> f64 {
    let key = ResilienceKey::new(provider, fingerprint);
    match self.buckets.get_mut(&key) {
      Some(mut bucket) => {
        bucket.refill(Instant::now());
        bucket.tokens
      }
      None => self.config_for(provider).capacity as f64,
    }
  }
}
