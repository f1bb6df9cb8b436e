//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TETHER_*)
//! 2. TOML config file (if TETHER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{Namespaces, VersionTag};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TETHER_*)
/// 2. TOML config file (if TETHER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tag of the deployed asset set. Namespaces are named `{version_tag}-{kind}`.
    ///
    /// Set via TETHER_VERSION_TAG environment variable.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Only namespaces whose tag starts with this prefix are touched by
    /// activation cleanup. `None` considers every `{tag}-{kind}` namespace.
    #[serde(default)]
    pub owner_prefix: Option<String>,

    /// Origin the worker controls (scheme, host and port).
    ///
    /// Set via TETHER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// External hosts whose assets may be cached alongside same-origin ones.
    ///
    /// Set via TETHER_ALLOWED_HOSTS environment variable (`[a.com,b.com]`).
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// App-shell paths fetched into the static namespace at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Static-namespace path served to offline document requests before the
    /// generated placeholder page.
    #[serde(default)]
    pub offline_page: Option<String>,

    /// Capacity of the dynamic namespace.
    #[serde(default = "default_max_dynamic_entries")]
    pub max_dynamic_entries: usize,

    /// Capacity of the image namespace.
    #[serde(default = "default_max_image_entries")]
    pub max_image_entries: usize,

    /// Path to SQLite database holding namespaces and the pending-write queue.
    ///
    /// Set via TETHER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Reconnect signal tag that drains the pending-write queue.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Activate right after a successful install instead of waiting for the host.
    #[serde(default)]
    pub skip_waiting: bool,
}

fn default_version_tag() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_allowed_hosts() -> Vec<String> {
    ["fonts.googleapis.com", "fonts.gstatic.com", "cdn.jsdelivr.net", "unpkg.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_precache() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_max_dynamic_entries() -> usize {
    50
}

fn default_max_image_entries() -> usize {
    30
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tether-cache.sqlite")
}

fn default_user_agent() -> String {
    "tether/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_sync_tag() -> String {
    "pending-writes".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version_tag: default_version_tag(),
            owner_prefix: None,
            origin: default_origin(),
            allowed_hosts: default_allowed_hosts(),
            precache: default_precache(),
            offline_page: None,
            max_dynamic_entries: default_max_dynamic_entries(),
            max_image_entries: default_max_image_entries(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            sync_tag: default_sync_tag(),
            skip_waiting: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn version(&self) -> VersionTag {
        VersionTag::new(&self.version_tag)
    }

    /// Namespace names for the configured version.
    pub fn namespaces(&self) -> Namespaces {
        Namespaces::for_version(&self.version())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TETHER_`
    /// 2. TOML file from `TETHER_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("TETHER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TETHER_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version_tag, "v1");
        assert_eq!(config.origin, "http://localhost:8080");
        assert_eq!(config.max_dynamic_entries, 50);
        assert_eq!(config.max_image_entries, 30);
        assert_eq!(config.sync_tag, "pending-writes");
        assert_eq!(config.db_path, PathBuf::from("./tether-cache.sqlite"));
        assert!(config.allowed_hosts.contains(&"cdn.jsdelivr.net".to_string()));
        assert!(config.precache.contains(&"/index.html".to_string()));
        assert!(config.offline_page.is_none());
        assert!(config.owner_prefix.is_none());
        assert!(!config.skip_waiting);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_namespaces_follow_version_tag() {
        let config = AppConfig { version_tag: "v7".into(), ..Default::default() };
        let ns = config.namespaces();
        assert_eq!(ns.app_shell, "v7-static");
        assert_eq!(ns.dynamic, "v7-dynamic");
        assert_eq!(ns.images, "v7-images");
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let toml = r#"
            version_tag = "portfolio-2"
            max_image_entries = 12
            allowed_hosts = ["static.example.net"]
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.version_tag, "portfolio-2");
        assert_eq!(config.max_image_entries, 12);
        assert_eq!(config.max_dynamic_entries, 50);
        assert_eq!(config.allowed_hosts, vec!["static.example.net".to_string()]);
    }
}
