//! Decision service handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::middleware::apply_rate_limit_headers;
use crate::ratelimit::{RateLimiter, MAX_WINDOW_SECONDS};

/// Shared state for the decision service.
#[derive(Clone)]
pub struct AppState {
    /// The rate limiter instance
    pub limiter: Arc<RateLimiter>,
}

/// Body of `POST /v1/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub identifier: String,
    pub limit: u64,
    pub window_seconds: u64,
}

/// Body of a 400 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Record a request for an identifier and return the decision.
///
/// The decision is returned with 200 whether or not the request is admitted;
/// callers act on `allowed`.
#[instrument(skip(state, request), fields(identifier = %request.identifier))]
pub async fn check(State(state): State<AppState>, Json(request): Json<CheckRequest>) -> Response {
    if request.identifier.is_empty() {
        warn!("Received rate limit check with empty identifier");
        return bad_request("identifier is required");
    }
    if request.limit == 0 {
        warn!("Received rate limit check with zero limit");
        return bad_request("limit must be positive");
    }
    if request.window_seconds == 0 {
        warn!("Received rate limit check with zero window");
        return bad_request("window_seconds must be positive");
    }
    if request.window_seconds > MAX_WINDOW_SECONDS {
        warn!(
            window_seconds = request.window_seconds,
            "Received rate limit check with oversized window"
        );
        return bad_request(&format!(
            "window_seconds must be at most {}",
            MAX_WINDOW_SECONDS
        ));
    }

    let decision = state
        .limiter
        .check(&request.identifier, request.limit, request.window_seconds)
        .await;

    debug!(
        allowed = decision.allowed,
        remaining = decision.remaining,
        "Rate limit decision made"
    );

    let mut response = Json(decision).into_response();
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Admit a request forwarded for rate limiting.
///
/// Mounted behind [`enforce_rate_limit`](super::enforce_rate_limit), which
/// answers 429 before this runs when the caller is over its quota.
pub async fn admit() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Report liveness and which store is serving checks.
pub async fn healthz(State(state): State<AppState>) -> Response {
    info!(backend = state.limiter.backend_name(), "Health check");
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.limiter.backend_name(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::server::router;
    use crate::ratelimit::{Decision, MemoryWindowStore, QuotaPolicy};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> axum::Router {
        let limiter = RateLimiter::new().with_memory_store(MemoryWindowStore::new(0.0));
        router(Arc::new(limiter), QuotaPolicy::default())
    }

    fn check_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_identifier_rejected() {
        let response = test_router()
            .oneshot(check_request(serde_json::json!({
                "identifier": "",
                "limit": 10,
                "window_seconds": 10,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "identifier is required");
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let response = test_router()
            .oneshot(check_request(serde_json::json!({
                "identifier": "1.2.3.4",
                "limit": 0,
                "window_seconds": 10,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_zero_window_rejected() {
        let response = test_router()
            .oneshot(check_request(serde_json::json!({
                "identifier": "1.2.3.4",
                "limit": 10,
                "window_seconds": 0,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "window_seconds must be positive");
    }

    #[tokio::test]
    async fn test_oversized_window_rejected() {
        let response = test_router()
            .oneshot(check_request(serde_json::json!({
                "identifier": "a",
                "limit": 1,
                "window_seconds": u64::MAX / 10,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorBody = json_body(response).await;
        assert!(body.error.contains("at most"));
    }

    #[tokio::test]
    async fn test_longest_window_accepted() {
        let response = test_router()
            .oneshot(check_request(serde_json::json!({
                "identifier": "a",
                "limit": 1,
                "window_seconds": MAX_WINDOW_SECONDS,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let decision: Decision = json_body(response).await;
        assert!(decision.allowed);
        assert!(decision.reset_at > MAX_WINDOW_SECONDS);
    }

    #[tokio::test]
    async fn test_valid_request_returns_decision() {
        let app = test_router();
        let payload = serde_json::json!({
            "identifier": "anon",
            "limit": 1,
            "window_seconds": 5,
        });

        let response = app.clone().oneshot(check_request(payload.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "1");
        let decision: Decision = json_body(response).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);

        let response = app.oneshot(check_request(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let decision: Decision = json_body(response).await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_healthz_reports_backend() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "memory");
    }
}
