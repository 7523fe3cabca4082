//! HTTP surface: the rate limiting middleware for axum applications and the
//! standalone decision service.

mod identity;
mod middleware;
mod server;
mod service;

pub use identity::{client_ip, workspace_from_path, ClientIdentity, ANONYMOUS};
pub use middleware::{apply_rate_limit_headers, enforce_rate_limit, RateLimitState};
pub use server::{router, HttpServer};
pub use service::{AppState, CheckRequest, ErrorBody};
