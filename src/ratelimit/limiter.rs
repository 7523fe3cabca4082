//! Core rate limiter implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::backend::SlidingWindowStore;
use super::decision::Decision;
use super::memory::MemoryWindowStore;
use super::redis_store::RedisWindowStore;
use super::now_ms;
use crate::config::RateLimitingConfig;

/// What the limiter does when the durable store fails during a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request with the full limit remaining
    #[default]
    FailOpen,
    /// Count the request in the in-memory fixed window instead
    MemoryFallback,
}

/// Decides, per identifier, whether a request is admitted.
///
/// The durable store is injected once at construction. When it is absent
/// every check goes to the in-memory fixed window. `check` never fails:
/// infrastructure errors degrade according to the [`FailurePolicy`].
pub struct RateLimiter {
    /// Sliding-window store shared across processes, if configured
    durable: Option<Arc<dyn SlidingWindowStore>>,
    /// Process-local fixed-window counters
    memory: MemoryWindowStore,
    /// Behaviour on durable store failure
    on_backend_error: FailurePolicy,
}

impl RateLimiter {
    /// Create a rate limiter that only uses the in-memory store.
    pub fn new() -> Self {
        Self {
            durable: None,
            memory: MemoryWindowStore::default(),
            on_backend_error: FailurePolicy::default(),
        }
    }

    /// Create a rate limiter backed by a durable store.
    pub fn with_store(store: Arc<dyn SlidingWindowStore>) -> Self {
        Self {
            durable: Some(store),
            ..Self::new()
        }
    }

    /// Replace the in-memory store.
    pub fn with_memory_store(mut self, memory: MemoryWindowStore) -> Self {
        self.memory = memory;
        self
    }

    /// Set the behaviour on durable store failure.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_backend_error = policy;
        self
    }

    /// Build a rate limiter from configuration, connecting to Redis if both
    /// the URL and token are present.
    ///
    /// A missing credential or a failed connection disables the durable path
    /// for the lifetime of the returned limiter; this is logged here, once.
    pub async fn from_config(config: &RateLimitingConfig) -> Self {
        let memory = MemoryWindowStore::new(config.sweep_probability);

        let durable: Option<Arc<dyn SlidingWindowStore>> = match config.redis_credentials() {
            Some((url, token)) => {
                match RedisWindowStore::connect(url, token, config.key_prefix.clone()).await {
                    Ok(store) => Some(Arc::new(store)),
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Failed to connect to Redis window store; using in-memory rate limiting"
                        );
                        None
                    }
                }
            }
            None => {
                warn!("Redis URL or token not configured; using in-memory rate limiting");
                None
            }
        };

        let limiter = Self {
            durable,
            memory,
            on_backend_error: config.on_backend_error,
        };
        info!(
            backend = limiter.backend_name(),
            on_backend_error = ?limiter.on_backend_error,
            "Rate limiter initialized"
        );
        limiter
    }

    /// Check whether a request for `identifier` is admitted under `limit`
    /// requests per `window_seconds`.
    ///
    /// The request is counted whether or not it is admitted. `limit` and
    /// `window_seconds` are expected to be positive; the limiter does not
    /// validate them.
    pub async fn check(&self, identifier: &str, limit: u64, window_seconds: u64) -> Decision {
        self.check_at(identifier, limit, window_seconds, now_ms()).await
    }

    /// Like [`check`](Self::check), at an explicit arrival time (unix ms).
    pub async fn check_at(
        &self,
        identifier: &str,
        limit: u64,
        window_seconds: u64,
        now_ms: u64,
    ) -> Decision {
        trace!(
            identifier = %identifier,
            limit = limit,
            window_seconds = window_seconds,
            "Checking rate limit"
        );

        let decision = match &self.durable {
            Some(store) => match store.record(identifier, now_ms, window_seconds).await {
                Ok(count) => Decision::from_sliding_count(count, limit, window_seconds, now_ms),
                Err(e) => {
                    warn!(
                        identifier = %identifier,
                        backend = store.name(),
                        error = %e,
                        policy = ?self.on_backend_error,
                        "Rate limit backend failed"
                    );
                    match self.on_backend_error {
                        FailurePolicy::FailOpen => Decision::fail_open(limit, window_seconds, now_ms),
                        FailurePolicy::MemoryFallback => {
                            self.memory.check(identifier, limit, window_seconds, now_ms)
                        }
                    }
                }
            },
            None => self.memory.check(identifier, limit, window_seconds, now_ms),
        };

        if !decision.allowed {
            debug!(
                identifier = %identifier,
                limit = limit,
                reset_at = decision.reset_at,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Name of the store serving checks: the durable store's, or `memory`.
    pub fn backend_name(&self) -> &'static str {
        self.durable.as_ref().map(|s| s.name()).unwrap_or("memory")
    }

    /// Whether a durable store is configured.
    pub fn has_durable_store(&self) -> bool {
        self.durable.is_some()
    }

    /// The in-memory fallback store.
    pub fn memory(&self) -> &MemoryWindowStore {
        &self.memory
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
