use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use concord_provider::Fingerprint;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::CallError;
use crate::key::ResilienceKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
  /// Consecutive failures inside the window that open the breaker.
  pub failure_threshold: u32,
  pub window_ms: u64,
  pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
  fn default() -> Self {
    Self {
      failure_threshold: 5,
      window_ms: 60_000,
      cooldown_ms: 30_000,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
  Closed,
  Open,
  HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
  state: BreakerState,
  /// Timestamps of the current run of consecutive failures.
  failures: VecDeque<Instant>,
  opened_at: Option<Instant>,
  probe_in_flight: bool,
}

/// One fault-isolation state machine. Only reachable through the registry.
#[derive(Debug)]
struct CircuitBreaker {
  key: ResilienceKey,
  threshold: usize,
  window: Duration,
  cooldown: Duration,
  inner: Mutex<BreakerInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
  Normal,
  Probe,
}

impl CircuitBreaker {
  fn new(key: ResilienceKey, config: &BreakerConfig) -> Self {
    Self {
      key,
      threshold: config.failure_threshold.max(1) as usize,
      window: Duration::from_millis(config.window_ms),
      cooldown: Duration::from_millis(config.cooldown_ms),
      inner: Mutex::new(BreakerInner {
        state: BreakerState::Closed,
        failures: VecDeque::new(),
        opened_at: None,
        probe_in_flight: false,
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, BreakerInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Decide whether a call may proceed. The open -> half-open transition and
  /// the probe reservation happen under one lock, so only one caller probes.
  fn admit(&self) -> Result<Admission, CallError> {
    let mut inner = self.lock();
    let now = Instant::now();
    let state = inner.state;

    match state {
      BreakerState::Closed => Ok(Admission::Normal),
      BreakerState::Open => {
        let opened_at = inner.opened_at.unwrap_or(now);
        let reopen_at = opened_at + self.cooldown;
        if now >= reopen_at {
          inner.state = BreakerState::HalfOpen;
          inner.probe_in_flight = true;
          info!(key = %self.key, "breaker_half_open");
          Ok(Admission::Probe)
        } else {
          Err(self.open_error(reopen_at - now))
        }
      }
      BreakerState::HalfOpen if inner.probe_in_flight => Err(self.open_error(Duration::ZERO)),
      BreakerState::HalfOpen => {
        inner.probe_in_flight = true;
        Ok(Admission::Probe)
      }
    }
  }

  fn open_error(&self, retry_after: Duration) -> CallError {
    CallError::CircuitOpen {
      key: self.key.to_string(),
      retry_after,
    }
  }

  fn on_success(&self, admission: Admission) {
    let mut inner = self.lock();
    match admission {
      Admission::Normal => {
        // Stale successes do not close an open breaker.
        if inner.state == BreakerState::Closed {
          inner.failures.clear();
        }
      }
      Admission::Probe => {
        inner.failures.clear();
        inner.probe_in_flight = false;
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
        info!(key = %self.key, "breaker_closed");
      }
    }
  }

  fn on_failure(&self, admission: Admission) {
    let mut inner = self.lock();
    let now = Instant::now();
    let state = inner.state;

    match state {
      BreakerState::Closed => {
        inner.failures.push_back(now);
        while inner
          .failures
          .front()
          .is_some_and(|first| now.duration_since(*first) > self.window)
        {
          inner.failures.pop_front();
        }
        if inner.failures.len() >= self.threshold {
          inner.state = BreakerState::Open;
          inner.opened_at = Some(now);
          warn!(key = %self.key, failures = inner.failures.len(), "breaker_opened");
        }
      }
      BreakerState::HalfOpen if admission == Admission::Probe => {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(now);
        inner.probe_in_flight = false;
        warn!(key = %self.key, "breaker_reopened");
      }
      // A call admitted before the breaker opened finishing late changes nothing.
      _ => {}
    }
  }

  /// Outcome that says nothing about upstream health, or the probe was dropped.
  fn on_neutral(&self, admission: Admission) {
    if admission == Admission::Probe {
      self.lock().probe_in_flight = false;
    }
  }

  fn state(&self) -> BreakerState {
    self.lock().state
  }
}

/// Settles an admission exactly once. Dropping it unsettled, e.g. when the
/// caller's future is cancelled, releases a held probe slot.
struct AdmissionGuard<'a> {
  breaker: &'a CircuitBreaker,
  admission: Admission,
  settled: bool,
}

impl AdmissionGuard<'_> {
  fn settle<T>(mut self, result: &Result<T, CallError>) {
    match result {
      Ok(_) => self.breaker.on_success(self.admission),
      Err(err) if err.trips_breaker() => self.breaker.on_failure(self.admission),
      Err(_) => self.breaker.on_neutral(self.admission),
    }
    self.settled = true;
  }
}

impl Drop for AdmissionGuard<'_> {
  fn drop(&mut self) {
    if !self.settled {
      self.breaker.on_neutral(self.admission);
    }
  }
}

/// Shared reference to the single breaker of one key.
#[derive(Debug, Clone)]
pub struct BreakerHandle(Arc<CircuitBreaker>);

impl BreakerHandle {
  pub fn key(&self) -> &ResilienceKey {
    &self.0.key
  }

  pub fn state(&self) -> BreakerState {
    self.0.state()
  }

  /// Whether two handles refer to the same breaker instance.
  pub fn same_instance(&self, other: &BreakerHandle) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Run `operation` unless the breaker is open. The operation is never
  /// invoked on a short-circuit.
  pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, CallError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    let admission = self.0.admit()?;
    let guard = AdmissionGuard {
      breaker: &self.0,
      admission,
      settled: false,
    };
    let result = operation().await;
    guard.settle(&result);
    result
  }
}

/// Process-lifetime table of breakers, one per (provider, fingerprint).
#[derive(Debug, Default)]
pub struct BreakerRegistry {
  config: BreakerConfig,
  breakers: DashMap<ResilienceKey, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
  pub fn new(config: BreakerConfig) -> Self {
    Self {
      config,
      breakers: DashMap::new(),
    }
  }

  /// Look up or create the breaker for a key. Creation happens under the
  /// map shard's write lock, so concurrent first access yields one instance.
  pub fn get_or_create(&self, provider: &str, fingerprint: &Fingerprint) -> BreakerHandle {
    let key = ResilienceKey::new(provider, fingerprint);
    let breaker = self
      .breakers
      .entry(key.clone())
      .or_insert_with(|| Arc::new(CircuitBreaker::new(key, &self.config)))
      .clone();
    BreakerHandle(breaker)
  }

  pub async fn call_through<T, F, Fut>(
    &self,
    handle: &BreakerHandle,
    operation: F,
  ) -> Result<T, CallError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
  {
    handle.call(operation).await
  }

  /// Current state of a key, if a breaker exists for it.
  pub fn state(&self, provider: &str, fingerprint: &Fingerprint) -> Option<BreakerState> {
    self
      .breakers
      .get(&ResilienceKey::new(provider, fingerprint))
      .map(|breaker| breaker.state())
  }

  pub fn len(&self) -> usize {
    self.breakers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.breakers.is_empty()
  }
}
