//! comfyflow CLI - resolve models and build ComfyUI workflows
//!
//! This CLI provides a `comfyflow` command for inspecting the model registry,
//! resolving model identifiers, and emitting ComfyUI prompt graphs either
//! offline (from an inventory listing) or against a live server.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use comfyflow_abstraction::{EngineError, is_engine_error};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::types::{BuildArgs, ResolveArgs};
use commands::{build, check, models, resolve, supported};

/// Exit code for failures reported by the engine itself.
const ENGINE_ERROR_EXIT: u8 = 2;

/// comfyflow - ComfyUI workflow resolution and construction
#[derive(Parser, Debug)]
#[command(
    name = "comfyflow",
    author,
    version,
    about = "Resolve models and build ComfyUI workflows",
    long_about = "comfyflow reconciles a catalog of FLUX and Stable Diffusion models with the files installed on a ComfyUI server and emits ready-to-queue prompt graphs."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file (defaults to ./comfyflow.toml, then ~/.comfyflow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered model files
    Models {
        /// Only list files of this variant (e.g. dev, schnell, sdxl)
        #[arg(long)]
        variant: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a model filename in the registry
    Resolve(ResolveArgs),

    /// Show which model families and variants have a workflow builder
    Supported {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the workflow graph for a model
    ///
    /// Resolves the model against the inventory (a JSON listing given with
    /// --inventory, or the configured ComfyUI server) and prints the prompt
    /// graph.
    Build(BuildArgs),

    /// Check the connection to the configured ComfyUI server
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            if err.chain().any(is_engine_error) { ExitCode::from(ENGINE_ERROR_EXIT) } else { ExitCode::FAILURE }
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Models { variant, json } => models::execute(variant.as_deref(), json),
        Command::Resolve(resolve_args) => resolve::execute(&resolve_args),
        Command::Supported { json } => supported::execute(json),
        Command::Build(build_args) => {
            let config = config::load_config(args.config.as_deref())?;
            build::execute(&build_args, &config).await
        }
        Command::Check { json } => {
            let config = config::load_config(args.config.as_deref())?;
            check::execute(&config, json).await
        }
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let engine_error = err.chain().find_map(|e| e.downcast_ref::<EngineError>());
    if let Some(engine_error) = engine_error {
        eprintln!(
            "  {} {}/{}",
            "reason:".dimmed(),
            engine_error.layer(),
            engine_error.reason_code()
        );
        if let Some(details) = engine_error.details() {
            for (key, value) in details {
                eprintln!("  {} {}", format!("{}:", key).dimmed(), value);
            }
        }
    }
}
