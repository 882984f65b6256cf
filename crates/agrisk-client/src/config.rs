//! Client configuration
//!
//! Read from a TOML file where every key is optional, then overridden from
//! the environment.

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `base_url`
pub const ENV_BASE_URL: &str = "AGRISK_BASE_URL";
/// Overrides `state_dir`
pub const ENV_STATE_DIR: &str = "AGRISK_STATE_DIR";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// REST API base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Manual-entry auto-save quiet period in milliseconds
    pub autosave_debounce_ms: u64,
    /// How long an unobserved cache entry is kept for revival; 0 discards
    pub cache_retention_secs: u64,
    /// Directory holding the durable token store
    pub state_dir: PathBuf,
    /// Default tracing filter
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            autosave_debounce_ms: 800,
            cache_retention_secs: 0,
            state_dir: PathBuf::from(".agrisk"),
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With state directory
    #[inline]
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Load from `path`, apply environment overrides and validate
    ///
    /// A missing file yields defaults. A file that exists but does not parse
    /// is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ApiError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        let config = config.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ApiError::Config(e.to_string()))
    }

    /// Apply overrides from a variable lookup
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|v| !v.trim().is_empty()) {
            self.state_dir = PathBuf::from(dir);
        }
        self
    }

    /// Check that values are usable
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ApiError::Config(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "base_url {:?} must be an absolute http(s) URL",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ApiError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    #[must_use]
    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_secs)
    }

    /// Path of the durable token file
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.state_dir.join("tokens.json")
    }
}
