//! Exponential backoff for sync retries.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fieldnode_core::RetryConfig;
//!
//! let config = RetryConfig::new(5)
//!     .initial_delay(Duration::from_secs(1))
//!     .max_delay(Duration::from_secs(8));
//!
//! let delays: Vec<u64> = (0..5)
//!     .map(|n| config.delay_for_attempt(n).as_millis() as u64)
//!     .collect();
//! assert_eq!(delays, [1000, 2000, 4000, 8000, 8000]);
//! ```

use std::time::Duration;

/// Largest shift applied to the initial delay; anything above saturates.
const MAX_SHIFT: u32 = 32;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Failed attempts tolerated before giving up (0 means the first
    /// failure exhausts the budget).
    pub max_retries: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the default delays.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Build from millisecond settings.
    pub fn from_millis(max_retries: u32, initial_ms: u64, max_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    /// Set maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after a failure, given how many failures preceded it.
    ///
    /// `min(initial * 2^attempt, max)`, computed in whole milliseconds with
    /// the shift clamped so large attempt counts saturate instead of
    /// overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = duration_ms(self.initial_delay);
        let max = duration_ms(self.max_delay);
        let factor = 1u64 << attempt.min(MAX_SHIFT);
        Duration::from_millis(initial.saturating_mul(factor).min(max))
    }

    /// Whether `attempts` failures have used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_retries
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
