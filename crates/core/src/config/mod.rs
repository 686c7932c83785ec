//! Application configuration with layered loading.
//!
//! Configuration is loaded from multiple sources with figment:
//!
//! 1. Environment variables (GATEHOUSE_*)
//! 2. TOML config file (if GATEHOUSE_CONFIG_FILE set)
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
/// 1. Environment variables (GATEHOUSE_*)
/// 2. TOML config file (if GATEHOUSE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache store.
    ///
    /// Set via GATEHOUSE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The application's own origin; relative shell manifest entries are
    /// resolved against it.
    ///
    /// Set via GATEHOUSE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Shell version the agent should have live. Bumping it triggers a
    /// fresh install + activation cycle on the next agent start.
    ///
    /// Set via GATEHOUSE_SHELL_VERSION environment variable.
    #[serde(default = "default_shell_version")]
    pub shell_version: i64,

    /// Hosts whose traffic is never intercepted (the live database/API).
    /// Matched as case-insensitive host suffixes.
    ///
    /// Set via GATEHOUSE_API_HOSTS environment variable (comma-separated).
    #[serde(default)]
    pub api_hosts: Vec<String>,

    /// Platform-issued public key authorizing push subscription requests.
    ///
    /// Set via GATEHOUSE_PUSH_PUBLIC_KEY environment variable.
    /// Required only when the push broker subscribes.
    #[serde(default)]
    pub push_public_key: Option<String>,

    /// User-Agent string for outbound fetches.
    ///
    /// Set via GATEHOUSE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch timeout in milliseconds.
    ///
    /// Set via GATEHOUSE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to cache per response body.
    ///
    /// Set via GATEHOUSE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// How long a toast stays on the feed before auto-dismissal, in
    /// milliseconds.
    ///
    /// Set via GATEHOUSE_TOAST_DURATION_MS environment variable.
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./gatehouse-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_shell_version() -> i64 {
    1
}

fn default_user_agent() -> String {
    "gatehouse/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_toast_duration_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            shell_version: default_shell_version(),
            api_hosts: Vec::new(),
            push_public_key: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            toast_duration_ms: default_toast_duration_ms(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as a Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Toast auto-dismiss delay as a Duration.
    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GATEHOUSE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("GATEHOUSE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that a push public key is available (for deferred validation —
    /// it is only needed once the user grants notification permission).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the push public key is not set.
    pub fn require_push_public_key(&self) -> Result<&str, ConfigError> {
        self.push_public_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "push_public_key".into(),
            hint: "Set GATEHOUSE_PUSH_PUBLIC_KEY environment variable".into(),
        })
    }
}
