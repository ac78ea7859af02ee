//! FLUX schnell pipeline: few-step sampling without guidance.
//!
//! Guidance is fixed, so the workflow exposes no `cfg` binding and
//! `set_parameter(ParamName::Cfg, ..)` is rejected.

use comfyflow_abstraction::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{BuildContext, FluxComponents, save_image, weight_dtype};
use crate::workflow::built::{BuiltWorkflow, ParamName, ParameterBindings};
use crate::workflow::graph::{Node, WorkflowGraph};
use crate::workflow::params::{GenerationParams, ModelDefaults, SamplingParams};

/// Schnell is distilled for at most this many steps.
pub const MAX_SCHNELL_STEPS: u32 = 8;

pub fn build<'a>(
    model: &'a str,
    params: &'a GenerationParams,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>> {
    async move {
        let mut sampling = ctx.resolve_params(params, &ModelDefaults::FLUX_SCHNELL)?;
        sampling.steps = sampling.steps.clamp(1, MAX_SCHNELL_STEPS);
        sampling.cfg = 1.0;
        let components = FluxComponents::resolve(ctx, model).await?;
        debug!(model = %model, steps = sampling.steps, "Building FLUX schnell workflow");
        graph(model, &components, &sampling, &ctx.filename_prefix)
    }
    .boxed()
}

fn graph(
    model: &str,
    components: &FluxComponents,
    params: &SamplingParams,
    prefix: &str,
) -> Result<BuiltWorkflow> {
    let mut graph = WorkflowGraph::new();
    let mut bindings = ParameterBindings::new();

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
    let encode = graph.add(
        Node::new("CLIPTextEncode", "Positive Prompt")
            .link("clip", clip, 0)
            .with("text", params.prompt.as_str()),
    );
    let latent = graph.add(
        Node::new("EmptySD3LatentImage", "Empty Latent Image")
            .with("width", params.width)
            .with("height", params.height)
            .with("batch_size", 1),
    );
    let noise = graph.add(Node::new("RandomNoise", "Random Noise").with("noise_seed", params.seed));
    let sampler = graph.add(
        Node::new("KSamplerSelect", "Sampler Select").with("sampler_name", params.sampler_name.as_str()),
    );
    let scheduler = graph.add(
        Node::new("BasicScheduler", "Basic Scheduler")
            .link("model", unet, 0)
            .with("scheduler", params.scheduler.as_str())
            .with("steps", params.steps)
            .with("denoise", 1.0),
    );
    let guider = graph.add(
        Node::new("BasicGuider", "Basic Guider")
            .link("model", unet, 0)
            .link("conditioning", encode, 0),
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

    bindings.bind(ParamName::Prompt, encode, "text");
    bindings.bind(ParamName::Width, latent, "width");
    bindings.bind(ParamName::Height, latent, "height");
    bindings.bind(ParamName::Steps, scheduler, "steps");
    bindings.bind(ParamName::Seed, noise, "noise_seed");
    bindings.bind(ParamName::SamplerName, sampler, "sampler_name");
    bindings.bind(ParamName::Scheduler, scheduler, "scheduler");

    BuiltWorkflow::new(graph, vec![save], bindings)
}
