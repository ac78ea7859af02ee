//! FLUX dev/krea pipeline: guidance-distilled sampling with split prompts.

use comfyflow_abstraction::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{BuildContext, FluxComponents, save_image, scale_image, source_size, weight_dtype};
use crate::registry::ModelFamily;
use crate::workflow::built::{BuiltWorkflow, ParamName, ParameterBindings};
use crate::workflow::graph::{Node, WorkflowGraph};
use crate::workflow::params::{GenerationParams, ModelDefaults, SamplingParams};
use crate::workflow::prompt::split_prompt;

const MAX_SHIFT: f64 = 1.15;
const BASE_SHIFT: f64 = 0.5;

pub fn build<'a>(
    model: &'a str,
    params: &'a GenerationParams,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>> {
    async move {
        let sampling = ctx.resolve_params(params, &ModelDefaults::FLUX_DEV)?;
        let components = FluxComponents::resolve(ctx, model).await?;
        debug!(model = %model, "Building FLUX dev workflow");
        graph(model, &components, &sampling, &ctx.filename_prefix, None)
    }
    .boxed()
}

/// Assembles the dev graph, optionally conditioned on a reference image.
///
/// With a reference, the image is scaled to the requested size (fitted to
/// FLUX limits), encoded once, and used both as the reference latent and as
/// the starting latent denoised at `strength`.
pub(crate) fn graph(
    model: &str,
    components: &FluxComponents,
    params: &SamplingParams,
    prefix: &str,
    reference_image: Option<&str>,
) -> Result<BuiltWorkflow> {
    let prompt = split_prompt(&params.prompt);
    let mut graph = WorkflowGraph::new();
    let mut bindings = ParameterBindings::new();
    let (width, height) = match reference_image {
        Some(_) => {
            let target = source_size(params, ModelFamily::Flux);
            (target.width, target.height)
        }
        None => (params.width, params.height),
    };

    let clip = graph.add(
        Node::new("DualCLIPLoader", "DualCLIP Loader")
            .with("clip_name1", components.t5.as_str())
            .with("clip_name2", components.clip_l.as_str())
            .with("type", "flux"),
    );
    let unet = graph.add(
        Node::new("UNETLoader", "UNET Loader")
            .with("unet_name", model)
            .with("weight_dtype", weight_dtype(model)),
    );
    let vae = graph.add(Node::new("VAELoader", "VAE Loader").with("vae_name", components.vae.as_str()));

    let sampling_model = graph.add(
        Node::new("ModelSamplingFlux", "Model Sampling Flux")
            .link("model", unet, 0)
            .with("max_shift", MAX_SHIFT)
            .with("base_shift", BASE_SHIFT)
            .with("width", width)
            .with("height", height),
    );
    let encode = graph.add(
        Node::new("CLIPTextEncodeFlux", "CLIP Text Encode Flux")
            .link("clip", clip, 0)
            .with("clip_l", prompt.clip_l)
            .with("t5xxl", prompt.t5xxl)
            .with("guidance", params.cfg),
    );
    let guidance = graph.add(
        Node::new("FluxGuidance", "Flux Guidance")
            .link("conditioning", encode, 0)
            .with("guidance", params.cfg),
    );

    let (conditioning, latent, denoise) = match reference_image {
        Some(image) => {
            let load = graph.add(Node::new("LoadImage", "Load Reference Image").with("image", image));
            let scale = graph.add(scale_image(load, width, height));
            let encoded = graph.add(
                Node::new("VAEEncode", "Encode Reference")
                    .link("pixels", scale, 0)
                    .link("vae", vae, 0),
            );
            let reference = graph.add(
                Node::new("ReferenceLatent", "Reference Latent")
                    .link("conditioning", guidance, 0)
                    .link("latent", encoded, 0),
            );
            bindings.bind(ParamName::Width, scale, "width");
            bindings.bind(ParamName::Height, scale, "height");
            (reference, encoded, params.strength)
        }
        None => {
            let latent = graph.add(
                Node::new("EmptySD3LatentImage", "Empty Latent Image")
                    .with("width", width)
                    .with("height", height)
                    .with("batch_size", 1),
            );
            bindings.bind(ParamName::Width, latent, "width");
            bindings.bind(ParamName::Height, latent, "height");
            (guidance, latent, 1.0)
        }
    };

    let noise = graph.add(Node::new("RandomNoise", "Random Noise").with("noise_seed", params.seed));
    let sampler = graph.add(
        Node::new("KSamplerSelect", "Sampler Select").with("sampler_name", params.sampler_name.as_str()),
    );
    let scheduler = graph.add(
        Node::new("BasicScheduler", "Basic Scheduler")
            .link("model", sampling_model, 0)
            .with("scheduler", params.scheduler.as_str())
            .with("steps", params.steps)
            .with("denoise", denoise),
    );
    let guider = graph.add(
        Node::new("BasicGuider", "Basic Guider")
            .link("model", sampling_model, 0)
            .link("conditioning", conditioning, 0),
    );
    let sample = graph.add(
        Node::new("SamplerCustomAdvanced", "Sampler Custom Advanced")
            .link("noise", noise, 0)
            .link("guider", guider, 0)
            .link("sampler", sampler, 0)
            .link("sigmas", scheduler, 0)
            .link("latent_image", latent, 0),
    );
    let decode = graph.add(
        Node::new("VAEDecode", "VAE Decode")
            .link("samples", sample, 0)
            .link("vae", vae, 0),
    );
    let save = graph.add(save_image(prefix, decode));

    if reference_image.is_some() {
        bindings.bind(ParamName::Strength, scheduler, "denoise");
    }
    bindings.bind(ParamName::Prompt, encode, "clip_l");
    bindings.bind(ParamName::Prompt, encode, "t5xxl");
    bindings.bind(ParamName::Width, sampling_model, "width");
    bindings.bind(ParamName::Height, sampling_model, "height");
    bindings.bind(ParamName::Steps, scheduler, "steps");
    bindings.bind(ParamName::Seed, noise, "noise_seed");
    bindings.bind(ParamName::Cfg, encode, "guidance");
    bindings.bind(ParamName::Cfg, guidance, "guidance");
    bindings.bind(ParamName::SamplerName, sampler, "sampler_name");
    bindings.bind(ParamName::Scheduler, scheduler, "scheduler");

    BuiltWorkflow::new(graph, vec![save], bindings)
}
