//! Quota tiers and how they are chosen for a request.
//!
//! Tenant-scoped traffic (requests routed under a workspace) is trusted with a
//! higher ceiling than anonymous traffic. Each tier is a [`Quota`]: a request
//! ceiling over a window measured in seconds.

use serde::{Deserialize, Serialize};

use super::MAX_WINDOW_SECONDS;
use crate::error::{Result, WindowguardError};

/// A request ceiling over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Maximum requests admitted per window
    pub limit: u64,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl Quota {
    /// Create a new quota.
    pub const fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }

    fn validate(&self, tier: &str) -> Result<()> {
        if self.limit == 0 {
            return Err(WindowguardError::Config(format!(
                "{} quota limit must be positive",
                tier
            )));
        }
        if self.window_seconds == 0 {
            return Err(WindowguardError::Config(format!(
                "{} quota window_seconds must be positive",
                tier
            )));
        }
        if self.window_seconds > MAX_WINDOW_SECONDS {
            return Err(WindowguardError::Config(format!(
                "{} quota window_seconds must be at most {}",
                tier, MAX_WINDOW_SECONDS
            )));
        }
        Ok(())
    }
}

/// The traffic class a request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// No workspace in the route
    Anonymous,
    /// Request scoped to a tenant workspace
    Workspace,
}

/// Quotas for each traffic tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Quota for requests without a workspace
    #[serde(default = "default_anonymous")]
    pub anonymous: Quota,

    /// Quota for workspace-scoped requests
    #[serde(default = "default_workspace")]
    pub workspace: Quota,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            anonymous: default_anonymous(),
            workspace: default_workspace(),
        }
    }
}

fn default_anonymous() -> Quota {
    Quota::new(10, 10)
}

fn default_workspace() -> Quota {
    Quota::new(200, 10)
}

impl QuotaPolicy {
    /// Get the quota that applies to a tier.
    pub fn quota_for(&self, tier: Tier) -> Quota {
        match tier {
            Tier::Anonymous => self.anonymous,
            Tier::Workspace => self.workspace,
        }
    }

    /// Reject quotas the limiter cannot meaningfully enforce.
    pub fn validate(&self) -> Result<()> {
        self.anonymous.validate("anonymous")?;
        self.workspace.validate("workspace")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quotas() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.quota_for(Tier::Anonymous), Quota::new(10, 10));
        assert_eq!(policy.quota_for(Tier::Workspace), Quota::new(200, 10));
    }

    #[test]
    fn test_parse_partial_policy() {
        let yaml = r#"
workspace:
  limit: 500
  window_seconds: 60
"#;
        let policy: QuotaPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.workspace, Quota::new(500, 60));
        // Missing tiers keep their defaults
        assert_eq!(policy.anonymous, Quota::new(10, 10));
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let policy = QuotaPolicy {
            anonymous: Quota::new(0, 10),
            ..Default::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("anonymous"));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let policy = QuotaPolicy {
            workspace: Quota::new(100, 0),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_window() {
        let policy = QuotaPolicy {
            workspace: Quota::new(100, MAX_WINDOW_SECONDS + 1),
            ..Default::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("at most"));

        let policy = QuotaPolicy {
            workspace: Quota::new(100, MAX_WINDOW_SECONDS),
            ..Default::default()
        };
        assert!(policy.validate().is_ok());
    }
}
