//! Windowguard - API Rate Limiting
//!
//! This crate implements the rate limiter protecting a multi-tenant content
//! API. Requests are counted per client identity in a sliding window stored
//! in Redis, with a process-local fixed window used when Redis is not
//! configured. Infrastructure failures never block requests.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod ratelimit;
