//! Error types for the Windowguard service.

use thiserror::Error;

/// Main error type for Windowguard operations.
#[derive(Error, Debug)]
pub enum WindowguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors talking to the durable window store
    #[error("Backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for WindowguardError {
    fn from(err: ::config::ConfigError) -> Self {
        WindowguardError::Config(err.to_string())
    }
}

/// Result type alias for Windowguard operations.
pub type Result<T> = std::result::Result<T, WindowguardError>;
