//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version_tag` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - a namespace capacity is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `user_agent` or `sync_tag` is empty
    /// - a precache entry is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version_tag.is_empty() {
            return Err(ConfigError::Invalid { field: "version_tag".into(), reason: "must not be empty".into() });
        }
        if self.version_tag.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "version_tag".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.host_str().is_some() => {}
            Ok(_) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: "must be an http(s) URL with a host".into(),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.max_dynamic_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_dynamic_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_image_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_image_entries".into(),
                reason: "must be greater than 0".into(),
            });
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

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.sync_tag.is_empty() {
            return Err(ConfigError::Invalid { field: "sync_tag".into(), reason: "must not be empty".into() });
        }

        if self.precache.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "precache".into(), reason: "entries must not be empty".into() });
        }

        if let Some(prefix) = &self.owner_prefix
            && !self.version_tag.starts_with(prefix.as_str())
        {
            tracing::warn!(
                owner_prefix = %prefix,
                version_tag = %self.version_tag,
                "version_tag does not start with owner_prefix; current namespaces are outside cleanup scope"
            );
        }

        Ok(())
    }
}
