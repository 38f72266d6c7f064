use std::sync::{Mutex, MutexGuard, PoisonError};

use concord_provider::TokenUsage;

use crate::result::FailureReason;

#[derive(Debug, Default)]
struct Spend {
  cost: f64,
  usage: TokenUsage,
}

/// Token usage and estimated spend of one run, against an optional ceiling
/// in USD.
///
/// The ceiling is checked before each submission, so calls already in flight
/// when it is reached can overshoot it.
#[derive(Debug)]
pub(crate) struct CostTracker {
  ceiling: Option<f64>,
  spend: Mutex<Spend>,
}

impl CostTracker {
  pub fn new(ceiling: Option<f64>) -> Self {
    Self {
      ceiling,
      spend: Mutex::new(Spend::default()),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Spend> {
    self.spend.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn check(&self) -> Result<(), FailureReason> {
    let Some(ceiling) = self.ceiling else {
      return Ok(());
    };
    let spent = self.lock().cost;
    if spent >= ceiling {
      return Err(FailureReason::BudgetExceeded { spent, ceiling });
    }
    Ok(())
  }

  pub fn record(&self, usage: &TokenUsage, cost: f64) {
    let mut spend = self.lock();
    spend.cost += cost;
    spend.usage.add(usage);
  }

  pub fn totals(&self) -> (TokenUsage, f64) {
    let spend = self.lock();
    (spend.usage, spend.cost)
  }
}
