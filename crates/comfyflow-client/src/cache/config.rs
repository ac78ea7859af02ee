//! Configuration for inventory caching.

use comfyflow_abstraction::{ConfigError, ConfigReason, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the inventory cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether inventory caching is enabled (default: false, every resolution
    /// re-queries the backend).
    #[serde(default)]
    pub enabled: bool,

    /// Seconds a cached file list stays valid (default: 300 = 5 minutes).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: false, ttl_secs: default_ttl_secs() }
    }
}

impl CacheConfig {
    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns a `Config` error with reason `INVALID_CONFIG` if the TTL is zero.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::new(
                ConfigReason::InvalidConfig,
                "Invalid cache TTL: must be greater than 0",
            )
            .with_detail("field", "cache.ttl_secs")
            .into());
        }
        Ok(())
    }

    /// Get the TTL as a Duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
