//! Durable window store trait.

use async_trait::async_trait;

use crate::error::Result;

/// A store that keeps a sliding window of request records per identifier.
///
/// Implementations must perform the whole update as one atomic unit with
/// respect to other requests for the same identifier: prune records older
/// than the window, count what is left, record the current request, and
/// refresh the key's expiry to twice the window.
#[async_trait]
pub trait SlidingWindowStore: Send + Sync {
    /// Record a request at `now_ms` and return how many records were in the
    /// window before it was added.
    async fn record(&self, identifier: &str, now_ms: u64, window_seconds: u64) -> Result<u64>;

    /// Short name of the store for logs and health output.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process stores for exercising the sliding-window path.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Mutex;

    /// Emulates a sorted set per key, with the same prune/count/add steps
    /// the Redis store runs in its transaction.
    #[derive(Default)]
    pub struct SortedSetStore {
        sets: Mutex<HashMap<String, Vec<(u64, String)>>>,
        seq: AtomicU64,
    }

    impl SortedSetStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self, identifier: &str) -> usize {
            self.sets
                .lock()
                .await
                .get(identifier)
                .map(|s| s.len())
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl SlidingWindowStore for SortedSetStore {
        async fn record(&self, identifier: &str, now_ms: u64, window_seconds: u64) -> Result<u64> {
            let window_start = now_ms.saturating_sub(crate::ratelimit::window_ms(window_seconds));
            let member = format!("{}-{}", now_ms, self.seq.fetch_add(1, Ordering::SeqCst));

            let mut sets = self.sets.lock().await;
            let set = sets.entry(identifier.to_string()).or_default();
            set.retain(|(score, _)| *score >= window_start);
            let count = set.len() as u64;
            set.push((now_ms, member));
            Ok(count)
        }

        fn name(&self) -> &'static str {
            "sorted-set"
        }
    }

    /// A store whose every call fails, as if the backend were unreachable.
    #[derive(Default)]
    pub struct FailingStore {
        pub calls: AtomicU64,
    }

    #[async_trait]
    impl SlidingWindowStore for FailingStore {
        async fn record(&self, _identifier: &str, _now_ms: u64, _window_seconds: u64) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }
}
