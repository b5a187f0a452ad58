//! Exponential retry delays.

use std::time::Duration;

/// `min(base * factor^n, ceiling)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            factor: 2,
            ceiling: Duration::from_secs(5 * 60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        let multiplier = self.factor.checked_pow(retry).unwrap_or(u32::MAX);
        self.base
            .checked_mul(multiplier)
            .map_or(self.ceiling, |delay| delay.min(self.ceiling))
    }
}
