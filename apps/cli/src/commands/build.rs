//! Build command implementation.

use super::types::BuildArgs;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use comfyflow_core::{
    BuiltWorkflow, ComfyEngine, EngineConfig, GenerationParams, ParamName, RandomSeedGenerator,
    StaticInventory,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Execute the build command.
pub async fn execute(args: &BuildArgs, config: &EngineConfig) -> Result<()> {
    let engine = match &args.inventory {
        Some(path) => {
            let inventory = StaticInventory::from_file(path)
                .with_context(|| format!("Failed to load inventory from {}", path.display()))?;
            ComfyEngine::new(Arc::new(inventory), Arc::new(RandomSeedGenerator))
                .with_filename_prefix(config.output.filename_prefix.clone())
        }
        None => ComfyEngine::from_config(config)?,
    };

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let params = generation_params(args);
    let (model, mut workflow) = engine.generate(&args.model, &params, &token).await?;
    debug!(file = %model.matched_filename, "Resolved model");

    for assignment in &args.overrides {
        let (name, value) = parse_override(assignment)?;
        workflow.set_parameter(name, value)?;
    }

    let rendered = render(&workflow, args.bindings)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} ({} nodes) -> {}",
                "Built".green().bold(),
                model.matched_filename,
                workflow.graph().len(),
                path.display()
            );
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn generation_params(args: &BuildArgs) -> GenerationParams {
    GenerationParams {
        negative_prompt: args.negative_prompt.clone(),
        width: args.width,
        height: args.height,
        steps: args.steps,
        seed: args.seed,
        cfg: args.cfg,
        sampler_name: args.sampler.clone(),
        scheduler: args.scheduler.clone(),
        image: args.image.clone(),
        strength: args.strength,
        ..GenerationParams::new(args.prompt.clone())
    }
}

/// Parses `name=value`. The value is read as JSON, falling back to a plain string.
fn parse_override(assignment: &str) -> Result<(ParamName, Value)> {
    let (name, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid override {:?}, expected NAME=VALUE", assignment))?;
    let name = name.trim().parse::<ParamName>().map_err(|e| anyhow!(e))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name, value))
}

fn render(workflow: &BuiltWorkflow, with_bindings: bool) -> Result<String> {
    let rendered = if with_bindings {
        serde_json::to_string_pretty(workflow)?
    } else {
        serde_json::to_string_pretty(&workflow.to_prompt())?
    };
    Ok(rendered)
}
