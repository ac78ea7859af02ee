//! Check command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use comfyflow_client::ComfyUiClient;
use comfyflow_core::EngineConfig;

/// Execute the check command.
pub async fn execute(config: &EngineConfig, json_output: bool) -> Result<()> {
    let client = ComfyUiClient::with_timeout(&config.backend.base_url, &config.backend.auth, config.timeout())?;
    let stats = client
        .validate_connection()
        .await
        .with_context(|| format!("ComfyUI at {} is not usable", client.base_url()))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} {}", "Connected:".green().bold(), client.base_url());
    println!("  {:<10} {}", "auth", config.backend.auth.kind());
    if let Some(version) = &stats.system.comfyui_version {
        println!("  {:<10} {}", "comfyui", version);
    }
    if let Some(os) = &stats.system.os {
        println!("  {:<10} {}", "os", os);
    }
    for device in &stats.devices {
        let vram = device
            .vram_total
            .map_or_else(|| "-".to_string(), |bytes| format!("{} MiB", bytes / (1024 * 1024)));
        println!("  {:<10} {} ({})", "device", device.name, vram.dimmed());
    }
    Ok(())
}
