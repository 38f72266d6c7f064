use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use concord_provider::ProviderError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CallError;

const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub floor_ms: u64,
  pub ceiling_ms: u64,
  /// Used until a provider has `min_samples` recorded latencies.
  pub initial_ms: u64,
  pub multiplier: f64,
  pub percentile: f64,
  pub window_size: usize,
  pub min_samples: usize,
}

impl Default for TimeoutConfig {
  fn default() -> Self {
    Self {
      floor_ms: 2_000,
      ceiling_ms: 120_000,
      initial_ms: 30_000,
      multiplier: 2.0,
      percentile: 0.95,
      window_size: 64,
      min_samples: 5,
    }
  }
}

/// Adaptive per-provider timeouts and the single transient retry.
///
/// The timeout for a call is `max(floor, percentile(window) * multiplier)`,
/// capped at the ceiling.
#[derive(Debug, Default)]
pub struct TimeoutController {
  config: TimeoutConfig,
  windows: DashMap<String, VecDeque<Duration>>,
}

impl TimeoutController {
  pub fn new(config: TimeoutConfig) -> Self {
    Self {
      config,
      windows: DashMap::new(),
    }
  }

  pub fn current_timeout(&self, provider: &str) -> Duration {
    let floor = Duration::from_millis(self.config.floor_ms);
    let ceiling = Duration::from_millis(self.config.ceiling_ms).max(floor);

    let observed = self.windows.get(provider).and_then(|window| {
      if window.len() < self.config.min_samples.max(1) {
        return None;
      }
      let mut sorted: Vec<Duration> = window.iter().copied().collect();
      sorted.sort_unstable();
      Some(percentile(&sorted, self.config.percentile))
    });

    match observed {
      Some(latency) => {
        let scaled = latency.as_secs_f64() * self.config.multiplier.max(0.0);
        Duration::try_from_secs_f64(scaled)
          .unwrap_or(ceiling)
          .clamp(floor, ceiling)
      }
      None => Duration::from_millis(self.config.initial_ms).clamp(floor, ceiling),
    }
  }

  pub fn record(&self, provider: &str, latency: Duration) {
    let mut window = self.windows.entry(provider.to_string()).or_default();
    window.push_back(latency);
    while window.len() > self.config.window_size.max(1) {
      window.pop_front();
    }
  }

  /// Run `operation` under the current timeout. A timed-out attempt is
  /// cancelled by dropping its future.
  ///
  /// One retry follows a timeout or a transient transport failure, with the
  /// timeout recomputed after the first attempt was recorded. Permanent
  /// failures return immediately.
  pub async fn with_timeout<T, F, Fut>(&self, provider: &str, mut operation: F) -> Result<T, CallError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
  {
    let mut attempt = 1;
    loop {
      let limit = self.current_timeout(provider);
      let started = Instant::now();

      let err = match tokio::time::timeout(limit, operation()).await {
        Ok(Ok(value)) => {
          self.record(provider, started.elapsed());
          return Ok(value);
        }
        Ok(Err(err)) if !err.is_transient() => return Err(err.into()),
        Ok(Err(err)) => CallError::Provider(err),
        Err(_) => {
          // The deadline is a lower bound on this attempt's latency.
          self.record(provider, limit);
          debug!(provider = %provider, timeout_ms = limit.as_millis() as u64, "call_timed_out");
          CallError::Timeout { after: limit }
        }
      };

      if attempt >= MAX_ATTEMPTS {
        return Err(err);
      }
      warn!(provider = %provider, attempt, error = %err, "call_retrying");
      attempt += 1;
    }
  }
}

/// Nearest-rank percentile over a sorted, non-empty slice.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
  let p = p.clamp(0.0, 1.0);
  let rank = (p * sorted.len() as f64).ceil() as usize;
  sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use concord_provider::{GenerationResult, TokenUsage};

  use super::*;

  fn controller() -> TimeoutController {
    TimeoutController::new(TimeoutConfig {
      floor_ms: 100,
      ceiling_ms: 10_000,
      initial_ms: 1_000,
      multiplier: 2.0,
      percentile: 0.95,
      window_size: 4,
      min_samples: 3,
    })
  }

  fn ok(text: &str) -> GenerationResult {
    GenerationResult {
      text: text.to_string(),
      usage: TokenUsage::default(),
      latency_ms: 0,
    }
  }

  #[test]
  fn test_initial_timeout_until_min_samples() {
    let controller = controller();
    assert_eq!(controller.current_timeout("p1"), Duration::from_millis(1_000));

    controller.record("p1", Duration::from_millis(200));
    controller.record("p1", Duration::from_millis(300));
    assert_eq!(controller.current_timeout("p1"), Duration::from_millis(1_000));

    controller.record("p1", Duration::from_millis(400));
    assert_eq!(controller.current_timeout("p1"), Duration::from_millis(800));
  }

  #[test]
  fn test_floor_ceiling_and_window_eviction() {
    let controller = controller();
    for _ in 0..4 {
      controller.record("fast", Duration::from_millis(10));
      controller.record("slow", Duration::from_secs(60));
    }
    assert_eq!(controller.current_timeout("fast"), Duration::from_millis(100));
    assert_eq!(controller.current_timeout("slow"), Duration::from_millis(10_000));

    for _ in 0..4 {
      controller.record("slow", Duration::from_millis(500));
    }
    assert_eq!(controller.current_timeout("slow"), Duration::from_millis(1_000));
  }

  #[test]
  fn test_oversized_multiplier_saturates_at_ceiling() {
    for multiplier in [f64::MAX, f64::INFINITY, 1e300] {
      let controller = TimeoutController::new(TimeoutConfig {
        multiplier,
        min_samples: 1,
        ..TimeoutConfig::default()
      });
      controller.record("p1", Duration::from_secs(30));
      assert_eq!(controller.current_timeout("p1"), Duration::from_millis(120_000));
    }
  }

  #[test]
  fn test_percentile_nearest_rank() {
    let samples: Vec<Duration> = (1..=20).map(Duration::from_millis).collect();
    assert_eq!(percentile(&samples, 0.95), Duration::from_millis(19));
    assert_eq!(percentile(&samples, 1.0), Duration::from_millis(20));
    assert_eq!(percentile(&samples, 0.0), Duration::from_millis(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_timeout_retries_once_then_fails() {
    let controller = controller();
    let calls = AtomicU32::new(0);

    let result = controller
      .with_timeout("p1", || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<GenerationResult, ProviderError>>()
      })
      .await;

    assert!(matches!(result, Err(CallError::Timeout { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_attempt_is_cancelled() {
    let controller = controller();
    let completed = std::sync::Arc::new(AtomicU32::new(0));

    let counter = completed.clone();
    let result = controller
      .with_timeout("p1", move || {
        let counter = counter.clone();
        async move {
          tokio::time::sleep(Duration::from_secs(5)).await;
          counter.fetch_add(1, Ordering::SeqCst);
          Ok(ok("late"))
        }
      })
      .await;

    assert!(matches!(result, Err(CallError::Timeout { .. })));
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failure_retried_then_succeeds() {
    let controller = controller();
    let calls = AtomicU32::new(0);

    let result = controller
      .with_timeout("p1", || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
          if n == 0 {
            Err(ProviderError::UpstreamUnavailable("502".into()))
          } else {
            Ok(ok("second time"))
          }
        }
      })
      .await;

    assert_eq!(result.unwrap().text, "second time");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_permanent_failures_not_retried() {
    for err in [
      ProviderError::Auth("401".into()),
      ProviderError::InvalidRequest("400".into()),
    ] {
      let controller = controller();
      let calls = AtomicU32::new(0);

      let result = controller
        .with_timeout("p1", || {
          calls.fetch_add(1, Ordering::SeqCst);
          let err = err.clone();
          async move { Err::<GenerationResult, _>(err) }
        })
        .await;

      assert_eq!(result, Err(CallError::Provider(err.clone())));
      assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
  }
}
