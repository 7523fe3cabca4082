//! In-memory fixed-window fallback store.
//!
//! Used when no durable store is configured. Counters live in a sharded
//! concurrent map, so each identifier's read-modify-write happens under its
//! shard lock and stays atomic with preemptive worker threads. State is
//! process-local and lost on restart.
//!
//! This is a tumbling window: a burst straddling a window boundary can admit
//! up to twice the limit in a short span.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tracing::debug;

use super::decision::Decision;
use super::window_end_ms;

/// Counter state for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCounter {
    /// Requests seen in the current window, including denied ones
    pub count: u64,
    /// When the current window ends (unix ms)
    pub reset_at_ms: u64,
}

impl MemoryCounter {
    fn fresh(now_ms: u64, window_seconds: u64) -> Self {
        Self {
            count: 1,
            reset_at_ms: window_end_ms(now_ms, window_seconds),
        }
    }
}

/// Process-local fixed-window counters.
pub struct MemoryWindowStore {
    counters: DashMap<String, MemoryCounter>,
    /// Chance per call of sweeping expired counters
    sweep_probability: f64,
}

impl MemoryWindowStore {
    /// Create a store that sweeps with the given probability per call.
    ///
    /// The probability is clamped to `[0, 1]`.
    pub fn new(sweep_probability: f64) -> Self {
        let sweep_probability = if sweep_probability.is_nan() {
            0.0
        } else {
            sweep_probability.clamp(0.0, 1.0)
        };
        Self {
            counters: DashMap::new(),
            sweep_probability,
        }
    }

    /// Count a request at `now_ms` against `identifier`'s current window.
    pub fn check(&self, identifier: &str, limit: u64, window_seconds: u64, now_ms: u64) -> Decision {
        let counter = match self.counters.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) => {
                let counter = entry.get_mut();
                if now_ms >= counter.reset_at_ms {
                    *counter = MemoryCounter::fresh(now_ms, window_seconds);
                } else {
                    counter.count += 1;
                }
                *counter
            }
            Entry::Vacant(entry) => *entry.insert(MemoryCounter::fresh(now_ms, window_seconds)),
        };

        // The entry guard is released above; sweeping takes every shard lock.
        if self.sweep_probability > 0.0 && rand::thread_rng().gen_bool(self.sweep_probability) {
            self.sweep_expired(now_ms);
        }

        Decision::from_fixed_count(counter.count, limit, counter.reset_at_ms)
    }

    /// Remove every counter whose window ended before `now_ms`.
    ///
    /// Returns the number of counters removed.
    pub fn sweep_expired(&self, now_ms: u64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.reset_at_ms >= now_ms);
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed = removed, "Swept expired in-memory rate limit counters");
        }
        removed
    }

    /// Get the counter for an identifier, if one exists.
    pub fn counter(&self, identifier: &str) -> Option<MemoryCounter> {
        self.counters.get(identifier).map(|c| *c)
    }

    /// Get the number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no identifiers are tracked.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for MemoryWindowStore {
    fn default() -> Self {
        Self::new(0.01)
    }
}
