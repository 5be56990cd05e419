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

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `scope` is not an absolute http(s) URL
    /// - `version` or `cache_prefix` is empty
    /// - `manifest` contains an empty entry
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `fallback_document` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scope = url::Url::parse(&self.scope)
            .map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "scope".into(),
                reason: format!("unsupported scheme: {}", scope.scheme()),
            });
        }

        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        if self.manifest.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "manifest".into(), reason: "entries must not be empty".into() });
        }
        if self.manifest.is_empty() {
            tracing::warn!("manifest is empty; nothing will be precached on install");
        }

        if self.fallback_document.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "fallback_document".into(),
                hint: "Set BOITAGE_FALLBACK_DOCUMENT, e.g. ./index.html".into(),
            });
        }

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

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
