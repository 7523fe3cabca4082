//! Rate limiting middleware for axum routers.
//!
//! ```rust,ignore
//! use axum::{middleware, routing::get, Router};
//! use windowguard::http::{enforce_rate_limit, RateLimitState};
//!
//! let app = Router::new()
//!     .route("/api/v1/workspaces/{id}/posts", get(list_posts))
//!     .layer(middleware::from_fn_with_state(state, enforce_rate_limit));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, instrument};

use super::identity::ClientIdentity;
use crate::ratelimit::{Decision, QuotaPolicy, RateLimitExceeded, RateLimiter};

/// Shared state for [`enforce_rate_limit`].
#[derive(Clone)]
pub struct RateLimitState {
    /// The rate limiter instance
    pub limiter: Arc<RateLimiter>,
    /// Quotas per traffic tier
    pub policy: Arc<QuotaPolicy>,
}

impl RateLimitState {
    /// Create middleware state from a limiter and quota policy.
    pub fn new(limiter: Arc<RateLimiter>, policy: QuotaPolicy) -> Self {
        Self {
            limiter,
            policy: Arc::new(policy),
        }
    }
}

/// Count the request against its client identity and either forward it or
/// answer 429. Rate limit headers are attached to every response.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn enforce_rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = ClientIdentity::from_request(request.headers(), request.uri().path());
    let quota = state.policy.quota_for(identity.tier());

    let decision = state
        .limiter
        .check(&identity.identifier(), quota.limit, quota.window_seconds)
        .await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!(identity = %identity, tier = ?identity.tier(), "Rejecting request over rate limit");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitExceeded::from(&decision)),
        )
            .into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Set the `X-RateLimit-*` headers for a decision.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    for (name, value) in decision.header_pairs() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
}
