//! Single-checkpoint Stable Diffusion pipeline (SD1.5, SDXL, SD3.5 with
//! bundled encoders), text-to-image or image-to-image.

use comfyflow_abstraction::{InventoryCategory, Result, WorkflowError, WorkflowReason};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{BuildContext, save_image, scale_image, source_size};
use crate::registry::{CUSTOM_SD_VAE_FILENAME, ModelFamily, ModelVariant, RegistryEntry};
use crate::resolver::ComponentRole;
use crate::resolver::detector;
use crate::workflow::built::{BuiltWorkflow, ParamName, ParameterBindings};
use crate::workflow::graph::{Node, WorkflowGraph};
use crate::workflow::params::{GenerationParams, ModelDefaults, SamplingParams};

pub fn build<'a>(
    model: &'a str,
    params: &'a GenerationParams,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>> {
    async move {
        let entry = detector::entry_for(model)?;
        let (defaults, latent_class) = match entry.model_family {
            ModelFamily::Sd3 => (ModelDefaults::SD35, "EmptySD3LatentImage"),
            ModelFamily::Sdxl => (ModelDefaults::SDXL, "EmptyLatentImage"),
            ModelFamily::Sd1 => (ModelDefaults::SD15, "EmptyLatentImage"),
            ModelFamily::Flux => {
                return Err(WorkflowError::new(
                    WorkflowReason::UnsupportedModel,
                    format!("{} is not a single-checkpoint Stable Diffusion model", model),
                )
                .with_detail("model", model)
                .into());
            }
        };

        let sampling = ctx.resolve_params(params, &defaults)?;
        let vae = external_vae(ctx, &entry).await?;
        debug!(
            model = %model,
            family = %entry.model_family,
            vae = ?vae,
            img2img = sampling.image.is_some(),
            "Building Stable Diffusion workflow"
        );
        graph(model, entry.model_family, latent_class, vae.as_deref(), &sampling, &ctx.filename_prefix)
    }
    .boxed()
}

/// The autoencoder to load separately, if any. `None` uses the checkpoint's.
async fn external_vae(ctx: &BuildContext, entry: &RegistryEntry) -> Result<Option<String>> {
    match (entry.model_family, entry.variant) {
        (_, Some(ModelVariant::CustomSd)) => {
            let installed = ctx.components.inventory().list_files(InventoryCategory::Vae).await?;
            Ok(installed
                .iter()
                .any(|f| f == CUSTOM_SD_VAE_FILENAME)
                .then(|| CUSTOM_SD_VAE_FILENAME.to_string()))
        }
        (ModelFamily::Sd3, _) => Ok(None),
        (family, _) => ctx.components.optimal_component(ComponentRole::Vae, family).await,
    }
}

fn graph(
    model: &str,
    family: ModelFamily,
    latent_class: &str,
    vae: Option<&str>,
    params: &SamplingParams,
    prefix: &str,
) -> Result<BuiltWorkflow> {
    let mut graph = WorkflowGraph::new();
    let mut bindings = ParameterBindings::new();

    let checkpoint = graph.add(Node::new("CheckpointLoaderSimple", "Load Checkpoint").with("ckpt_name", model));
    let vae_source = match vae {
        Some(name) => (graph.add(Node::new("VAELoader", "VAE Loader").with("vae_name", name)), 0),
        None => (checkpoint, 2),
    };

    let positive = graph.add(
        Node::new("CLIPTextEncode", "Positive Prompt")
            .link("clip", checkpoint, 1)
            .with("text", params.prompt.as_str()),
    );
    let negative = graph.add(
        Node::new("CLIPTextEncode", "Negative Prompt")
            .link("clip", checkpoint, 1)
            .with("text", params.negative_prompt.as_str()),
    );

    let (latent, denoise) = match &params.image {
        Some(image) => {
            let target = source_size(params, family);
            let load = graph.add(Node::new("LoadImage", "Load Image").with("image", image.as_str()));
            let scale = graph.add(scale_image(load, target.width, target.height));
            let encoded = graph.add(
                Node::new("VAEEncode", "VAE Encode")
                    .link("pixels", scale, 0)
                    .link("vae", vae_source.0, vae_source.1),
            );
            bindings.bind(ParamName::Width, scale, "width");
            bindings.bind(ParamName::Height, scale, "height");
            (encoded, params.strength)
        }
        None => {
            let latent = graph.add(
                Node::new(latent_class, "Empty Latent Image")
                    .with("width", params.width)
                    .with("height", params.height)
                    .with("batch_size", 1),
            );
            bindings.bind(ParamName::Width, latent, "width");
            bindings.bind(ParamName::Height, latent, "height");
            (latent, 1.0)
        }
    };

    let sampler = graph.add(
        Node::new("KSampler", "KSampler")
            .link("model", checkpoint, 0)
            .link("positive", positive, 0)
            .link("negative", negative, 0)
            .link("latent_image", latent, 0)
            .with("seed", params.seed)
            .with("steps", params.steps)
            .with("cfg", params.cfg)
            .with("sampler_name", params.sampler_name.as_str())
            .with("scheduler", params.scheduler.as_str())
            .with("denoise", denoise),
    );
    let decode = graph.add(
        Node::new("VAEDecode", "VAE Decode")
            .link("samples", sampler, 0)
            .link("vae", vae_source.0, vae_source.1),
    );
    let save = graph.add(save_image(prefix, decode));

    if params.image.is_some() {
        bindings.bind(ParamName::Strength, sampler, "denoise");
    }
    bindings.bind(ParamName::Prompt, positive, "text");
    bindings.bind(ParamName::NegativePrompt, negative, "text");
    bindings.bind(ParamName::Steps, sampler, "steps");
    bindings.bind(ParamName::Seed, sampler, "seed");
    bindings.bind(ParamName::Cfg, sampler, "cfg");
    bindings.bind(ParamName::SamplerName, sampler, "sampler_name");
    bindings.bind(ParamName::Scheduler, sampler, "scheduler");

    BuiltWorkflow::new(graph, vec![save], bindings)
}
