//! Client settings
//!
//! Settings are layered: built-in defaults, then an optional configuration
//! file, then `SKILLVERSE_*` environment variables (`__` separates nested
//! keys, e.g. `SKILLVERSE_API__BASE_URL`).

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
}

/// REST API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend, without a trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Live channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Live channel origin; falls back to the API base URL
    pub url: Option<String>,
    /// Path of the WebSocket endpoint
    pub path: String,
    /// Reconnect attempts after a transient disconnect
    pub reconnect_attempts: u32,
    /// Base reconnect delay; attempt `n` waits `n * delay`
    pub reconnect_delay_ms: u64,
}

/// Persistent storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit store file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: "/ws".to_string(),
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value cannot be parsed
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SKILLVERSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// API base URL without a trailing slash
    pub fn api_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    /// Live channel origin, falling back to the API base URL
    pub fn socket_url(&self) -> &str {
        self.realtime
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.api.base_url)
            .trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.realtime.reconnect_delay_ms)
    }

    /// Location of the persistent store file
    pub fn storage_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("ai", "skillverse", "skillverse")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".skillverse"))
                .join("store.json")
        })
    }
}
