//! Concord Resilience
//!
//! Protects the engine from unreliable providers. Every generate call passes
//! through, in order:
//!
//! 1. [`RateGovernor`]: token-bucket admission, never parks the caller.
//! 2. [`BreakerRegistry`]: fast-fails calls to a (provider, credential) pair
//!    that keeps failing.
//! 3. [`TimeoutController`]: adaptive per-provider timeout and the single
//!    transient retry.
//!
//! Breaker and rate state is keyed by [`ResilienceKey`], built from the
//! credential fingerprint only. All tables are owned by the value that
//! created them, so tests construct isolated instances.

mod breaker;
mod error;
mod key;
mod rate;
mod timeout;

pub use breaker::{BreakerConfig, BreakerHandle, BreakerRegistry, BreakerState};
pub use error::CallError;
pub use key::ResilienceKey;
pub use rate::{Permit, RateConfig, RateGovernor};
pub use timeout::{TimeoutConfig, TimeoutController};
