//! Per-pipeline workflow builders.
//!
//! Every builder resolves its components asynchronously, then hands the
//! results to a pure graph function. A builder either returns a validated
//! [`BuiltWorkflow`] or an error; partial graphs are never produced.

pub mod flux_dev;
pub mod flux_kontext;
pub mod flux_schnell;
pub mod sd35;
pub mod simple_sd;

use comfyflow_abstraction::{EngineError, Inventory, Result, SeedGenerator, WorkflowError, WorkflowReason};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::registry::{ModelFamily, ModelRegistry, Precision};
use crate::resolver::detector;
use crate::resolver::{ComponentResolver, ComponentRole};
use crate::workflow::built::BuiltWorkflow;
use crate::workflow::graph::{Node, NodeId};
use crate::workflow::params::{GenerationParams, ModelDefaults, SamplingParams};
use crate::workflow::resize::{TargetDimensions, target_dimensions};

/// Default `SaveImage` filename prefix.
pub const DEFAULT_FILENAME_PREFIX: &str = "comfyflow";

/// Signature shared by every builder.
pub type BuilderFn = for<'a> fn(
    &'a str,
    &'a GenerationParams,
    &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>>;

/// Collaborators available to builders.
#[derive(Clone)]
pub struct BuildContext {
    pub components: ComponentResolver,
    pub seeds: Arc<dyn SeedGenerator>,
    pub filename_prefix: String,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("filename_prefix", &self.filename_prefix)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    pub fn new(inventory: Arc<dyn Inventory>, seeds: Arc<dyn SeedGenerator>) -> Self {
        Self {
            components: ComponentResolver::new(inventory),
            seeds,
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    pub(crate) fn resolve_params(
        &self,
        params: &GenerationParams,
        defaults: &ModelDefaults,
    ) -> Result<SamplingParams> {
        params.resolve(defaults, self.seeds.as_ref())
    }
}

/// Text encoders and autoencoder of a FLUX pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxComponents {
    pub clip_l: String,
    pub t5: String,
    pub vae: String,
}

impl FluxComponents {
    /// Resolves all three components concurrently.
    ///
    /// # Errors
    /// `MISSING_COMPONENT` naming the first absent role.
    pub async fn resolve(ctx: &BuildContext, model: &str) -> Result<Self> {
        let family = ModelFamily::Flux;
        let (clip_l, t5, vae) = futures::try_join!(
            ctx.components.optimal_component(ComponentRole::ClipL, family),
            ctx.components.optimal_component(ComponentRole::T5, family),
            ctx.components.optimal_component(ComponentRole::Vae, family),
        )?;
        Ok(Self {
            clip_l: clip_l.ok_or_else(|| missing_component(model, ComponentRole::ClipL))?,
            t5: t5.ok_or_else(|| missing_component(model, ComponentRole::T5))?,
            vae: vae.ok_or_else(|| missing_component(model, ComponentRole::Vae))?,
        })
    }
}

pub(crate) fn missing_component(model: &str, role: ComponentRole) -> EngineError {
    WorkflowError::new(
        WorkflowReason::MissingComponent,
        format!("No {} component installed for {}", role, model),
    )
    .with_detail("model", model)
    .with_detail("component", role.as_str())
    .into()
}

/// `weight_dtype` for a diffusion model loader.
pub(crate) fn weight_dtype(model: &str) -> &'static str {
    ModelRegistry::global()
        .get(model)
        .copied()
        .or_else(|| detector::detect(model))
        .and_then(|e| e.recommended_precision)
        .unwrap_or(Precision::Default)
        .as_str()
}

/// Requested size of a source image, fitted to the limits of `family`.
pub(crate) fn source_size(params: &SamplingParams, family: ModelFamily) -> TargetDimensions {
    let target = target_dimensions(params.width, params.height, family);
    if target.needs_resize {
        info!(
            family = %family,
            requested_width = params.width,
            requested_height = params.height,
            width = target.width,
            height = target.height,
            "Source image size adjusted to model limits"
        );
    }
    target
}

pub(crate) fn scale_image(image: NodeId, width: u32, height: u32) -> Node {
    Node::new("ImageScale", "Scale Image")
        .link("image", image, 0)
        .with("upscale_method", "lanczos")
        .with("width", width)
        .with("height", height)
        .with("crop", "center")
}

pub(crate) fn save_image(prefix: &str, images: NodeId) -> Node {
    Node::new("SaveImage", "Save Image")
        .with("filename_prefix", prefix)
        .link("images", images, 0)
}
