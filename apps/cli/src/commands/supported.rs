//! Supported command implementation.

use anyhow::Result;
use colored::Colorize;
use comfyflow_core::WorkflowRouter;
use comfyflow_core::registry::model_ids;
use serde_json::json;

/// Execute the supported command.
pub fn execute(json_output: bool) -> Result<()> {
    let routes = WorkflowRouter::routes();
    let models = WorkflowRouter::exactly_supported_models();
    let flux_variants = WorkflowRouter::supported_flux_variants();

    if json_output {
        let output = json!({
            "routes": routes
                .iter()
                .map(|r| json!({"family": r.family, "variant": r.variant, "builder": r.builder}))
                .collect::<Vec<_>>(),
            "fluxVariants": flux_variants,
            "modelIds": model_ids().collect::<Vec<_>>(),
            "supportedModels": models,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("{}", "Workflow Builders".bold().cyan());
    println!();
    for route in routes {
        println!("  {:<6} {:<14} -> {}", route.family.as_str(), route.variant.as_str(), route.builder.green());
    }
    println!();
    println!("{} {}", "Model ids:".bold(), model_ids().collect::<Vec<_>>().join(", "));
    println!("{} {} registered files", "Supported:".bold(), models.len());
    println!();
    Ok(())
}
