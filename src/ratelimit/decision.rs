//! Admission decisions and their HTTP representation.

use serde::{Deserialize, Serialize};

use super::window_end_ms;

/// Header carrying the configured ceiling.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the requests still permitted in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the unix time (seconds) the window expires.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// The outcome of a rate limit check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The configured ceiling for the window
    pub limit: u64,
    /// Requests still permitted in the current window
    pub remaining: u64,
    /// When the current window fully expires (unix seconds)
    pub reset_at: u64,
    /// Whether the request is admitted
    pub allowed: bool,
}

impl Decision {
    /// Build a decision from the sliding-window occupancy observed before
    /// the current request was recorded.
    ///
    /// One slot is reserved for the request just recorded, so `remaining`
    /// is `limit - count - 1`. The reset time is always a full window from
    /// `now`, not the expiry of the oldest record.
    pub fn from_sliding_count(count: u64, limit: u64, window_seconds: u64, now_ms: u64) -> Self {
        Self {
            limit,
            remaining: limit.saturating_sub(count).saturating_sub(1),
            reset_at: ceil_secs(window_end_ms(now_ms, window_seconds)),
            allowed: count < limit,
        }
    }

    /// Build a decision from a fixed-window counter that already includes
    /// the current request.
    pub fn from_fixed_count(count: u64, limit: u64, reset_at_ms: u64) -> Self {
        Self {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: ceil_secs(reset_at_ms),
            allowed: count <= limit,
        }
    }

    /// Admit the request without consulting any store.
    pub fn fail_open(limit: u64, window_seconds: u64, now_ms: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            reset_at: ceil_secs(window_end_ms(now_ms, window_seconds)),
            allowed: true,
        }
    }

    /// The standard rate limit response headers for this decision.
    pub fn header_pairs(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_at.to_string()),
        ]
    }
}

fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}

/// JSON body returned with a 429 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitExceeded {
    pub error: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

impl From<&Decision> for RateLimitExceeded {
    fn from(decision: &Decision) -> Self {
        Self {
            error: "Too many requests".to_string(),
            limit: decision.limit,
            remaining: decision.remaining,
            reset: decision.reset_at,
        }
    }
}
