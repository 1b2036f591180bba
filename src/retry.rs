//! Reconnect ceiling and backoff for cache reads.

use std::time::Duration;

/// Configuration for reconnect-and-retry on cache failures.
///
/// The ceiling is scoped to a single evaluation: every call starts with a
/// fresh budget, so failures in one request never disable another.
///
/// ```rust
/// # use freshcache::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(3)
///     .initial_delay(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum reconnects per evaluation (not counting the initial attempt).
    /// 0 = no retry. Default: 5.
    pub max_retries: u32,
    /// Delay before the first reconnect. Default: 50ms.
    pub initial_delay: Duration,
    /// Maximum delay between reconnects (caps exponential growth). Default: 1s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the reconnect ceiling.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay before the first reconnect.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between reconnects.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before reconnect number `attempt` (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}
