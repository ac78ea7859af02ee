//! Engine configuration file support.
//!
//! Configuration is read from TOML and can be overridden from the
//! environment:
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:8188"
//! timeout_secs = 30
//! auth = { type = "bearer", api_key = "..." }
//!
//! [cache]
//! enabled = true
//! ttl_secs = 300
//!
//! [output]
//! filename_prefix = "comfyflow"
//! ```

use comfyflow_abstraction::{ConfigError, ConfigReason, Result};
use comfyflow_client::{AuthConfig, CacheConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::workflow::DEFAULT_FILENAME_PREFIX;

/// Environment variable overriding `backend.base_url`.
pub const ENV_BASE_URL: &str = "COMFYUI_BASE_URL";
/// Environment variable overriding `backend.timeout_secs`.
pub const ENV_TIMEOUT_SECS: &str = "COMFYUI_TIMEOUT_SECS";
/// Environment variable that switches to bearer authentication.
pub const ENV_API_KEY: &str = "COMFYUI_API_KEY";

/// Connection settings for the ComfyUI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_secs: default_timeout_secs(), auth: AuthConfig::None }
    }
}

/// Settings for emitted graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `filename_prefix` written into every `SaveImage` node.
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
}

fn default_filename_prefix() -> String {
    DEFAULT_FILENAME_PREFIX.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { filename_prefix: default_filename_prefix() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// `MISSING_CONFIG` if the file does not exist, `CONFIG_PARSE_ERROR` if it
    /// cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::new(
                ConfigReason::MissingConfig,
                format!("Configuration file not found: {}", path.display()),
            )
            .with_detail("path", path.display().to_string())
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                ConfigReason::ConfigParseError,
                format!("Failed to read configuration file {}: {}", path.display(), e),
            )
            .with_detail("path", path.display().to_string())
        })?;

        let config = toml::from_str(&content).map_err(|e| {
            ConfigError::new(
                ConfigReason::ConfigParseError,
                format!("Failed to parse configuration file {}: {}", path.display(), e),
            )
            .with_detail("path", path.display().to_string())
        })?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("comfyflow.toml")
    }

    /// Default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map_or_else(|_| PathBuf::from("."), PathBuf::from)
            .join(".comfyflow")
            .join("config.toml")
    }

    /// Discover and load configuration.
    ///
    /// Looks for `./comfyflow.toml`, then `~/.comfyflow/config.toml`, and
    /// falls back to defaults when neither exists. Environment overrides are
    /// applied last.
    ///
    /// # Errors
    /// Propagates parse failures of a file that exists.
    pub fn load() -> Result<Self> {
        let mut config = [Self::default_local_path(), Self::default_global_path()]
            .into_iter()
            .find(|p| p.exists())
            .map_or_else(|| Ok(Self::default()), |p| Self::load_from_file(&p))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `COMFYUI_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.backend.auth = AuthConfig::Bearer { api_key: Some(key) };
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// `INVALID_CONFIG` with `details.field` naming the offending value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, message: &str| -> Result<()> {
            Err(ConfigError::new(ConfigReason::InvalidConfig, message).with_detail("field", field).into())
        };

        if self.backend.base_url.trim().is_empty() {
            return invalid("backend.base_url", "Backend base URL must not be empty");
        }
        if self.backend.timeout_secs == 0 {
            return invalid("backend.timeout_secs", "Backend timeout must be greater than 0");
        }
        if self.output.filename_prefix.trim().is_empty() {
            return invalid("output.filename_prefix", "Output filename prefix must not be empty");
        }
        self.cache.validate()
    }

    /// Backend request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }
}
