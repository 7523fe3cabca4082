//! Rate limiting logic and state management.
//!
//! [`RateLimiter`] admits or denies requests per identifier. It prefers a
//! durable sliding window ([`RedisWindowStore`]) and falls back to a
//! process-local fixed window ([`MemoryWindowStore`]) when no durable store
//! is configured.

mod backend;
mod decision;
mod limiter;
mod memory;
mod policy;
mod redis_store;

pub use backend::SlidingWindowStore;
pub use decision::{Decision, RateLimitExceeded, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET};
pub use limiter::{FailurePolicy, RateLimiter};
pub use memory::{MemoryCounter, MemoryWindowStore};
pub use policy::{Quota, QuotaPolicy, Tier};
pub use redis_store::RedisWindowStore;

/// Longest window accepted from untrusted callers (30 days).
pub const MAX_WINDOW_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Window length in milliseconds, saturating instead of overflowing.
pub(crate) fn window_ms(window_seconds: u64) -> u64 {
    window_seconds.saturating_mul(1000)
}

/// When a window starting at `now_ms` ends (unix ms), saturating at `u64::MAX`.
pub(crate) fn window_end_ms(now_ms: u64, window_seconds: u64) -> u64 {
    now_ms.saturating_add(window_ms(window_seconds))
}

/// Current unix time in milliseconds.
pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
