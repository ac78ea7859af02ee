//! CLI configuration loading.

use anyhow::{Context, Result};
use comfyflow_core::EngineConfig;
use std::path::Path;

/// Load engine configuration.
///
/// Configuration precedence:
/// 1. Environment variables (`COMFYUI_BASE_URL`, `COMFYUI_TIMEOUT_SECS`, `COMFYUI_API_KEY`)
/// 2. The file given with `--config`, which must exist
/// 3. Local config file (./comfyflow.toml)
/// 4. Global config file (~/.comfyflow/config.toml)
/// 5. Defaults
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let mut config = EngineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => EngineConfig::load().context("Failed to load configuration")?,
    };
    config.validate()?;
    Ok(config)
}
