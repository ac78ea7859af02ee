//! Resolve command implementation.

use super::types::ResolveArgs;
use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use comfyflow_core::{ModelRegistry, Precision, ResolveOptions};

/// Execute the resolve command.
pub fn execute(args: &ResolveArgs) -> Result<()> {
    let precision = args
        .precision
        .as_deref()
        .map(str::parse::<Precision>)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let options = ResolveOptions {
        case_insensitive: args.case_insensitive,
        variant: args.variant.clone(),
        model_family: args.family.clone(),
        priority: args.priority,
        recommended_precision: precision,
    };

    let Some(resolved) = ModelRegistry::global().resolve(&args.identifier, &options) else {
        bail!("No registered model matches {}", args.identifier);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("{} {}", "Matched:".bold(), resolved.matched_filename.green());
    println!("  {:<12} {}", "family", resolved.entry.model_family);
    if let Some(variant) = resolved.entry.variant {
        println!("  {:<12} {}", "variant", variant);
    }
    println!("  {:<12} {}", "priority", resolved.entry.priority);
    if let Some(precision) = resolved.entry.recommended_precision {
        println!("  {:<12} {}", "precision", precision);
    }
    println!("  {:<12} {:?}", "match", resolved.match_mode);
    Ok(())
}
