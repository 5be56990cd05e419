//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BOITAGE_*)
//! 2. TOML config file (if BOITAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BOITAGE_*)
/// 2. TOML config file (if BOITAGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the app. Defines the origin and resolves relative URLs.
    ///
    /// Set via BOITAGE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Version label. Changing it triggers install, activate and purge on next start.
    ///
    /// Set via BOITAGE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix for generation names (`{prefix}-{version}`).
    ///
    /// Set via BOITAGE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// URLs precached on install, relative to `scope`.
    ///
    /// Set via BOITAGE_MANIFEST environment variable (comma-separated).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Document served to offline navigations that have nothing cached.
    ///
    /// Set via BOITAGE_FALLBACK_DOCUMENT environment variable.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Path to SQLite cache database.
    ///
    /// Set via BOITAGE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via BOITAGE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via BOITAGE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via BOITAGE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_version() -> String {
    "2025.10.19-01".into()
}

fn default_cache_prefix() -> String {
    "boitage-tel".into()
}

fn default_manifest() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./styles.css",
        "./print-env.css",
        "./app.js",
        "./manifest.webmanifest",
        "./letter_moderne.html",
        "./letter_historique.html",
        "./letter_rurale.html",
        "./envelope_a4.html",
        "./print/envelope_dl_android.html",
        "./fonts/NotoSans-Regular.woff2",
        "./fonts/NotoSans-Bold.woff2",
        "./fonts/NotoSans-Regular.ttf",
        "./fonts/NotoSans-Bold.ttf",
        "./assets/icons/icon-192.png",
        "./assets/icons/icon-512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_document() -> String {
    "./index.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./boitage-cache.sqlite")
}

fn default_user_agent() -> String {
    "boitage/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            manifest: default_manifest(),
            fallback_document: default_fallback_document(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BOITAGE_`
    /// 2. TOML file from `BOITAGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BOITAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("BOITAGE_")
                .ignore(&["CONFIG_FILE", "MANIFEST"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if let Ok(manifest) = std::env::var("BOITAGE_MANIFEST") {
            config.manifest = manifest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;

        Ok(config)
    }
}
