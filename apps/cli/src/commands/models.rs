//! Models command implementation.

use anyhow::{Result, bail};
use colored::Colorize;
use comfyflow_core::{ModelRegistry, ModelVariant, RegistryEntry};
use serde_json::json;

/// Execute the models command.
pub fn execute(variant: Option<&str>, json_output: bool) -> Result<()> {
    let registry = ModelRegistry::global();
    let entries: Vec<(&str, &RegistryEntry)> = match variant {
        Some(variant) => {
            if variant.parse::<ModelVariant>().is_err() {
                bail!("Unknown variant: {} (expected one of {})", variant, variant_names());
            }
            registry
                .by_variant(variant)
                .into_iter()
                .filter_map(|name| registry.get(name).map(|entry| (name, entry)))
                .collect()
        }
        None => registry.iter().collect(),
    };

    if json_output {
        let list: Vec<_> = entries
            .iter()
            .map(|(name, entry)| {
                json!({
                    "filename": name,
                    "modelFamily": entry.model_family,
                    "variant": entry.variant,
                    "priority": entry.priority,
                    "recommendedPrecision": entry.recommended_precision,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Registered Models ({})", entries.len()).bold().cyan());
    println!();
    println!("{:<60} {:<6} {:<14} {:<4} {}", "Filename", "Family", "Variant", "Pri", "Precision");
    println!("{}", "-".repeat(100));
    for (name, entry) in &entries {
        println!(
            "{:<60} {:<6} {:<14} {:<4} {}",
            name,
            entry.model_family.as_str().cyan(),
            entry.variant.map_or("-", ModelVariant::as_str),
            entry.priority,
            entry.recommended_precision.map_or("-", |p| p.as_str()).dimmed()
        );
    }
    println!();
    Ok(())
}

fn variant_names() -> String {
    ModelVariant::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
}
