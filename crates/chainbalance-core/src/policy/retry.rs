//! Linear back-off for throttled and failed requests.
//!
//! TronGrid answers bursts with HTTP 429, so throttled attempts back off
//! twice as long as transport failures:
//!
//! | attempt | after 429   | after transport error |
//! |---------|-------------|-----------------------|
//! | 1       | 2 × unit    | 1 × unit              |
//! | 2       | 4 × unit    | 2 × unit              |

use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base time unit the back-off is measured in.
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Why the previous attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// HTTP 429.
    RateLimited,
    /// Connection-level failure.
    Transport,
}

/// Stateless retry policy: computes the delay after a failed attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Returns the delay after the `attempt`-th attempt (1-based) failed.
    /// Returns `None` when no attempts remain.
    pub fn next_delay(&self, attempt: u32, reason: RetryReason) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts() {
            return None;
        }
        let factor = match reason {
            RetryReason::RateLimited => attempt * 2,
            RetryReason::Transport => attempt,
        };
        Some(self.config.backoff_unit * factor)
    }
}
