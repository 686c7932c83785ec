//! Configuration validation rules.
//!
//! Validation runs after loading, regardless of which layer supplied the
//! values.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `toast_duration_ms` is 0
    /// - `shell_version` is less than 1
    /// - `user_agent` is empty
    /// - `origin` is not an absolute URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.toast_duration_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "toast_duration_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.shell_version < 1 {
            return Err(ConfigError::Invalid { field: "shell_version".into(), reason: "must be at least 1".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.origin.is_empty() || !self.origin.contains("://") {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: "must be an absolute URL (scheme://host)".into(),
            });
        }

        if self.api_hosts.is_empty() {
            tracing::warn!(
                "no excluded API hosts configured; \
                 live database/API responses will be served cache-first"
            );
        }

        Ok(())
    }
}
