//! comfyflow core - ComfyUI workflow resolution and construction.
//!
//! This crate provides:
//! - the static model registry and its filtered lookup
//! - live model and component resolution against an [`Inventory`]
//! - workflow builders for FLUX and Stable Diffusion pipelines
//! - the [`ComfyEngine`] facade with cancellation support
//!
//! # Example
//!
//! ```rust,no_run
//! use comfyflow_core::{ComfyEngine, EngineConfig, GenerationParams, ResolveOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> comfyflow_core::Result<()> {
//!     let engine = ComfyEngine::from_config(&EngineConfig::load()?)?;
//!     let token = CancellationToken::new();
//!     let model = engine.resolve_model("flux-dev", &ResolveOptions::default(), &token).await?;
//!     let workflow = engine.build_workflow(&model, &GenerationParams::new("a red fox"), &token).await?;
//!     println!("{}", workflow.to_prompt());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod inventory;
pub mod registry;
pub mod resolver;
pub mod workflow;

pub use comfyflow_abstraction::{EngineError, Inventory, InventoryCategory, Result, SeedGenerator};
pub use config::{BackendConfig, EngineConfig, OutputConfig};
pub use engine::ComfyEngine;
pub use inventory::{FixedSeedGenerator, RandomSeedGenerator, StaticInventory};
pub use registry::{
    MatchMode, ModelFamily, ModelRegistry, ModelVariant, Precision, RegistryEntry, ResolveOptions,
    ResolvedModel,
};
pub use resolver::{ComponentResolver, ComponentRole, EncoderConfiguration, ModelResolver};
pub use workflow::{
    BuildContext, BuiltWorkflow, GenerationParams, ParamName, ParameterBindings, WorkflowGraph,
    WorkflowRouter,
};
