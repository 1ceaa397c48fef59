//! Request pacing policies applied by [`BalanceClient`](crate::client::BalanceClient).
//!
//! ```text
//! Query → [RateLimiter] → [RetryPolicy] → [Transport]
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryConfig, RetryPolicy};
