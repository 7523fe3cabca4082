//! Redis-backed sliding window store.
//!
//! Each identifier owns a sorted set at `<prefix><identifier>`. Members are
//! unique per request and scored by arrival time in milliseconds. Every
//! access prunes members older than the window inside the same MULTI/EXEC
//! transaction that counts and records, so concurrent requests for one
//! identifier cannot both observe the same occupancy.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ConnectionInfo, IntoConnectionInfo};
use tracing::{info, trace};
use uuid::Uuid;

use super::backend::SlidingWindowStore;
use super::window_ms;
use crate::error::Result;

/// Durable window store shared across processes through Redis.
#[derive(Clone)]
pub struct RedisWindowStore {
    /// Multiplexed, auto-reconnecting connection; cloned per call
    conn: ConnectionManager,
    /// Prefix for window keys
    key_prefix: String,
}

impl RedisWindowStore {
    /// Connect to Redis, authenticating with `token` as the password.
    ///
    /// An empty token leaves any password from the URL in place.
    ///
    /// Failure here is meant to be surfaced once by the caller; the store is
    /// never rebuilt per request.
    pub async fn connect(url: &str, token: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let info = connection_info(url, token)?;
        let addr = info.addr.to_string();

        let client = redis::Client::open(info)?;
        let conn = ConnectionManager::new(client).await?;

        info!(addr = %addr, "Connected to Redis window store");

        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    /// The Redis key holding the window for an identifier.
    pub fn key(&self, identifier: &str) -> String {
        window_key(&self.key_prefix, identifier)
    }
}

fn connection_info(url: &str, token: &str) -> Result<ConnectionInfo> {
    let mut info = url.into_connection_info()?;
    if !token.is_empty() {
        info.redis.password = Some(token.to_string());
    }
    Ok(info)
}

fn window_key(prefix: &str, identifier: &str) -> String {
    format!("{}{}", prefix, identifier)
}

/// A sorted-set member unique to this request, even within one millisecond.
fn request_member(now_ms: u64) -> String {
    format!("{}-{}", now_ms, Uuid::new_v4().simple())
}

#[async_trait]
impl SlidingWindowStore for RedisWindowStore {
    async fn record(&self, identifier: &str, now_ms: u64, window_seconds: u64) -> Result<u64> {
        let key = self.key(identifier);
        let window_start = now_ms.saturating_sub(window_ms(window_seconds));
        let ttl = i64::try_from(window_seconds.saturating_mul(2)).unwrap_or(i64::MAX);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrembyscore(&key, "-inf", format!("({}", window_start))
            .ignore()
            .zcard(&key)
            .zadd(&key, request_member(now_ms), now_ms)
            .ignore()
            .expire(&key, ttl)
            .ignore();

        let mut conn = self.conn.clone();
        let (count,): (u64,) = pipe.query_async(&mut conn).await?;

        trace!(key = %key, count = count, "Recorded request in sliding window");
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
