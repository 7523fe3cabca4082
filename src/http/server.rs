//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::middleware::{enforce_rate_limit, RateLimitState};
use super::service::{admit, check, healthz, AppState};
use crate::error::{Result, WindowguardError};
use crate::ratelimit::{QuotaPolicy, RateLimiter};

/// Build the decision service router.
///
/// `/v1/admit/{*path}` is the forward-auth route: a proxy sends the original
/// path and client headers, and the configured quota tiers decide between
/// 204 and 429.
pub fn router(limiter: Arc<RateLimiter>, policy: QuotaPolicy) -> Router {
    let admission = Router::new()
        .route("/v1/admit/{*path}", any(admit))
        .layer(middleware::from_fn_with_state(
            RateLimitState::new(limiter.clone(), policy),
            enforce_rate_limit,
        ));

    Router::new()
        .route("/v1/check", post(check))
        .route("/healthz", get(healthz))
        .with_state(AppState { limiter })
        .merge(admission)
}

/// HTTP server for the decision service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
    /// Quotas applied on the admission route
    policy: QuotaPolicy,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>, policy: QuotaPolicy) -> Self {
        Self {
            addr,
            rate_limiter,
            policy,
        }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            WindowguardError::Io(e)
        })?;

        info!(
            addr = %self.addr,
            backend = self.rate_limiter.backend_name(),
            "Starting HTTP server for rate limit decisions"
        );

        axum::serve(listener, router(self.rate_limiter, self.policy))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                WindowguardError::Io(e)
            })
    }
}
