//! # Exponential Backoff
//!
//! Per-key retry delays for the work queue: `base * 2^attempt`, capped at
//! `max`. Stateless; the attempt count lives in the queue.

use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Delay before the first retry
    pub const DEFAULT_BASE: Duration = Duration::from_millis(5);
    /// Upper bound for any single delay
    pub const DEFAULT_MAX: Duration = Duration::from_secs(1000);

    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay for the given zero-based attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_MAX)
    }
}
