//! Shared abstractions for comfyflow.
//!
//! This crate defines the layered error taxonomy and the two collaborator seams
//! the engine consumes: a live file inventory of the inference backend and a
//! unique-seed generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod error;

pub use error::{
    ConfigError, ConfigReason, EngineError, ErrorLayer, LayerError, ModelResolverError,
    ModelResolverReason, Reason, Result, ServicesError, ServicesReason, UtilsError, UtilsReason,
    WorkflowError, WorkflowReason, is_engine_error,
};

/// A class of files the backend can list.
///
/// Each category is read from the option list of one loader node input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryCategory {
    /// Full checkpoints (`CheckpointLoaderSimple.ckpt_name`).
    Checkpoints,
    /// Standalone diffusion models (`UNETLoader.unet_name`).
    DiffusionModels,
    /// Text encoders (`CLIPLoader.clip_name`).
    TextEncoders,
    /// Autoencoders (`VAELoader.vae_name`).
    Vae,
    /// LoRA adapters (`LoraLoader.lora_name`).
    Loras,
}

impl InventoryCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::Checkpoints, Self::DiffusionModels, Self::TextEncoders, Self::Vae, Self::Loras];

    /// The loader node class whose input lists this category.
    pub const fn loader_node(self) -> &'static str {
        match self {
            Self::Checkpoints => "CheckpointLoaderSimple",
            Self::DiffusionModels => "UNETLoader",
            Self::TextEncoders => "CLIPLoader",
            Self::Vae => "VAELoader",
            Self::Loras => "LoraLoader",
        }
    }

    /// The loader input that holds the file list.
    pub const fn input_name(self) -> &'static str {
        match self {
            Self::Checkpoints => "ckpt_name",
            Self::DiffusionModels => "unet_name",
            Self::TextEncoders => "clip_name",
            Self::Vae => "vae_name",
            Self::Loras => "lora_name",
        }
    }

    /// The snake_case name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkpoints => "checkpoints",
            Self::DiffusionModels => "diffusion_models",
            Self::TextEncoders => "text_encoders",
            Self::Vae => "vae",
            Self::Loras => "loras",
        }
    }
}

impl fmt::Display for InventoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checkpoints" | "checkpoint" => Ok(Self::Checkpoints),
            "diffusion_models" | "unet" => Ok(Self::DiffusionModels),
            "text_encoders" | "clip" => Ok(Self::TextEncoders),
            "vae" => Ok(Self::Vae),
            "loras" | "lora" => Ok(Self::Loras),
            _ => Err(format!("Unknown inventory category: {}", s)),
        }
    }
}

/// Read access to the files installed on the inference backend.
///
/// Implementations report transport failures as `Services` layer errors. An
/// empty list is a valid answer and never an error.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Lists the files of one category.
    async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>>;

    /// Returns true if `filename` is listed in `category`.
    async fn contains(&self, category: InventoryCategory, filename: &str) -> Result<bool> {
        Ok(self.list_files(category).await?.iter().any(|f| f == filename))
    }
}

#[async_trait]
impl<T: Inventory + ?Sized> Inventory for Arc<T> {
    async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
        (**self).list_files(category).await
    }
}

/// Produces seeds for builds that do not specify one.
pub trait SeedGenerator: Send + Sync {
    /// Returns `count` seeds, pairwise distinct within one call.
    fn generate_seeds(&self, count: usize) -> Vec<u64>;
}

impl<T: SeedGenerator + ?Sized> SeedGenerator for Arc<T> {
    fn generate_seeds(&self, count: usize) -> Vec<u64> {
        (**self).generate_seeds(count)
    }
}
