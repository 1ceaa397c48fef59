//! Token bucket rate limiter.
//!
//! The bucket holds at most `rate` tokens. Whole intervals elapsed since the
//! last refill each add `rate` tokens (capped); partial intervals add
//! nothing. [`RateLimiter::acquire`] suspends the caller until a token is
//! available, sleeping one replenishment period (`interval / rate`) between
//! attempts. The bucket lock is never held across the sleep.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per `interval`; also the bucket capacity.
    pub rate: u32,
    /// Refill window.
    pub interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate: 12, // TronGrid keyed limit is ~15 rps, stay under it
            interval: Duration::from_secs(1),
        }
    }
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Blocking token bucket, one per credential-bound client.
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let config = RateLimiterConfig {
            rate: config.rate.max(1),
            interval: config.interval,
        };
        Self {
            state: Mutex::new(BucketState {
                tokens: config.rate,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.config.rate
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = self.replenish_period();
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limited, waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token if one is available without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    /// Time for a single token to be replenished.
    pub fn replenish_period(&self) -> Duration {
        self.config.interval / self.config.rate
    }

    fn refill(&self, state: &mut BucketState) {
        if self.config.interval.is_zero() {
            state.tokens = self.config.rate;
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        let windows = elapsed.as_nanos() / self.config.interval.as_nanos();
        if windows > 0 {
            let added = windows.saturating_mul(self.config.rate as u128);
            let total = (state.tokens as u128).saturating_add(added);
            state.tokens = total.min(self.config.rate as u128) as u32;
            state.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn acquire_within_capacity() {
        let rl = RateLimiter::new(RateLimiterConfig {
            rate: 10,
            interval: Duration::from_secs(60),
        });
        for _ in 0..10 {
            assert!(rl.try_acquire(), "should succeed within capacity");
        }
        assert!(!rl.try_acquire(), "should be rate limited");
        assert_eq!(rl.available(), 0);
    }

    #[test]
    fn replenish_period_is_interval_over_rate() {
        let rl = RateLimiter::new(RateLimiterConfig {
            rate: 4,
            interval: Duration::from_secs(1),
        });
        assert_eq!(rl.replenish_period(), Duration::from_millis(250));
    }

    #[test]
    fn zero_rate_is_clamped() {
        let rl = RateLimiter::new(RateLimiterConfig {
            rate: 0,
            interval: Duration::from_secs(1),
        });
        assert_eq!(rl.capacity(), 1);
        assert!(rl.try_acquire());
    }

    #[test]
    fn refills_after_whole_interval() {
        let rl = RateLimiter::new(RateLimiterConfig {
            rate: 2,
            interval: Duration::from_millis(50),
        });
        assert!(rl.try_acquire());
        assert!(rl.try_acquire());
        assert!(!rl.try_acquire());
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(rl.available(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_capacity_per_interval() {
        let interval = Duration::from_millis(100);
        let start = Instant::now();
        let rl = Arc::new(RateLimiter::new(RateLimiterConfig { rate: 5, interval }));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let rl = rl.clone();
            handles.push(tokio::spawn(async move {
                let mut stamps = Vec::new();
                for _ in 0..5 {
                    rl.acquire().await;
                    stamps.push(start.elapsed());
                }
                stamps
            }));
        }

        let mut stamps = Vec::new();
        for h in handles {
            stamps.extend(h.await.unwrap());
        }
        stamps.sort();
        assert_eq!(stamps.len(), 15);

        // 15 tokens at 5 per window: the last grant needs two full refills.
        assert!(
            stamps[14] >= interval * 2,
            "15 acquisitions finished too fast: {:?}",
            stamps[14]
        );
        // Grants arrive in bursts of at most `rate`, separated by refills.
        let window = interval / 2;
        for (i, t) in stamps.iter().enumerate() {
            let in_window = stamps[i..].iter().take_while(|s| **s < *t + window).count();
            assert!(in_window <= 5, "{in_window} grants within {window:?} from {t:?}");
        }
    }
}
