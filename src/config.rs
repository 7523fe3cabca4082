//! Configuration management for Windowguard.
//!
//! Configuration is layered: serde defaults, then an optional YAML file, then
//! `WINDOWGUARD__*` environment variables (double underscore separates
//! nesting, e.g. `WINDOWGUARD__RATE_LIMITING__REDIS_URL`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, WindowguardError};
use crate::ratelimit::{FailurePolicy, QuotaPolicy};

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "WINDOWGUARD";

/// Main configuration for the Windowguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowguardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Redis URL for the durable window store
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Auth token for the durable window store
    #[serde(default)]
    pub redis_token: Option<String>,

    /// Prefix for window keys in Redis
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// What to do when the durable store fails at request time
    #[serde(default)]
    pub on_backend_error: FailurePolicy,

    /// Chance per call that the memory store sweeps expired counters
    #[serde(default = "default_sweep_probability")]
    pub sweep_probability: f64,

    /// Quotas per traffic tier
    #[serde(default)]
    pub quotas: QuotaPolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_token: None,
            key_prefix: default_key_prefix(),
            on_backend_error: FailurePolicy::default(),
            sweep_probability: default_sweep_probability(),
            quotas: QuotaPolicy::default(),
        }
    }
}

fn default_key_prefix() -> String {
    "ratelimit:".to_string()
}

fn default_sweep_probability() -> f64 {
    0.01
}

impl RateLimitingConfig {
    /// Connection parameters for the durable store, if both are present.
    pub fn redis_credentials(&self) -> Option<(&str, &str)> {
        let url = self.redis_url.as_deref().filter(|u| !u.is_empty())?;
        let token = self.redis_token.as_deref().filter(|t| !t.is_empty())?;
        Some((url, token))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl WindowguardConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(WindowguardError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path));
        }
        let config: WindowguardConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WindowguardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| WindowguardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let p = self.rate_limiting.sweep_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(WindowguardError::Config(format!(
                "sweep_probability must be within [0, 1], got {}",
                p
            )));
        }
        self.rate_limiting.quotas.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::Quota;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = WindowguardConfig::default();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.rate_limiting.key_prefix, "ratelimit:");
        assert_eq!(config.rate_limiting.on_backend_error, FailurePolicy::FailOpen);
        assert!(config.rate_limiting.redis_credentials().is_none());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  http_addr: "0.0.0.0:9000"
rate_limiting:
  redis_url: "redis://cache:6379"
  redis_token: "s3cret"
  on_backend_error: memory_fallback
  quotas:
    anonymous:
      limit: 20
      window_seconds: 30
logging:
  format: json
"#;
        let config = assert_ok!(WindowguardConfig::from_yaml(yaml));
        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(
            config.rate_limiting.redis_credentials(),
            Some(("redis://cache:6379", "s3cret"))
        );
        assert_eq!(
            config.rate_limiting.on_backend_error,
            FailurePolicy::MemoryFallback
        );
        assert_eq!(config.rate_limiting.quotas.anonymous, Quota::new(20, 30));
        assert_eq!(config.rate_limiting.quotas.workspace, Quota::new(200, 10));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_credentials_require_url_and_token() {
        let mut rl = RateLimitingConfig {
            redis_url: Some("redis://localhost".to_string()),
            ..Default::default()
        };
        assert!(rl.redis_credentials().is_none());

        rl.redis_token = Some(String::new());
        assert!(rl.redis_credentials().is_none());

        rl.redis_token = Some("token".to_string());
        assert!(rl.redis_credentials().is_some());
    }

    #[test]
    fn test_invalid_sweep_probability() {
        let yaml = r#"
rate_limiting:
  sweep_probability: 1.5
"#;
        assert_err!(WindowguardConfig::from_yaml(yaml));
    }

    #[test]
    fn test_missing_config_file() {
        let result = WindowguardConfig::load(Some(Path::new("/nonexistent/windowguard.yaml")));
        assert!(matches!(result, Err(WindowguardError::Config(_))));
    }
}
