//! SD3.5 pipeline with separately loaded text encoders.

use comfyflow_abstraction::{Result, WorkflowError, WorkflowReason};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::{BuildContext, save_image};
use crate::registry::ModelFamily;
use crate::resolver::{ComponentRole, EncoderConfiguration};
use crate::workflow::built::{BuiltWorkflow, ParamName, ParameterBindings};
use crate::workflow::graph::{Node, NodeId, WorkflowGraph};
use crate::workflow::params::{GenerationParams, ModelDefaults, SamplingParams};

pub fn build<'a>(
    model: &'a str,
    params: &'a GenerationParams,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>> {
    async move {
        let sampling = ctx.resolve_params(params, &ModelDefaults::SD35)?;
        let encoders = resolve_encoders(ctx, model).await?;
        debug!(model = %model, encoders = encoders.kind(), "Building SD3.5 workflow");
        graph(model, &encoders, &sampling, &ctx.filename_prefix)
    }
    .boxed()
}

/// Picks the richest encoder setup installed.
///
/// # Errors
/// `MISSING_ENCODER` with `details.model` when no usable setup exists.
pub async fn resolve_encoders(ctx: &BuildContext, model: &str) -> Result<EncoderConfiguration> {
    let family = ModelFamily::Sd3;
    let (clip_l, clip_g, t5) = futures::try_join!(
        ctx.components.optimal_component(ComponentRole::ClipL, family),
        ctx.components.optimal_component(ComponentRole::ClipG, family),
        ctx.components.optimal_component(ComponentRole::T5, family),
    )?;

    EncoderConfiguration::select(clip_l, clip_g, t5).ok_or_else(|| {
        warn!(model = %model, "No text encoders installed for SD3.5");
        WorkflowError::new(
            WorkflowReason::MissingEncoder,
            format!("No usable text encoders for {}: install clip_l + clip_g or t5xxl", model),
        )
        .with_detail("model", model)
        .into()
    })
}

fn encoder_loader(encoders: &EncoderConfiguration) -> Node {
    match encoders {
        EncoderConfiguration::Triple { clip_l, clip_g, t5 } => Node::new("TripleCLIPLoader", "Triple CLIP Loader")
            .with("clip_name1", clip_l.as_str())
            .with("clip_name2", clip_g.as_str())
            .with("clip_name3", t5.as_str()),
        EncoderConfiguration::DualClip { clip_l, clip_g } => Node::new("DualCLIPLoader", "Dual CLIP Loader")
            .with("clip_name1", clip_l.as_str())
            .with("clip_name2", clip_g.as_str())
            .with("type", "sd3"),
        EncoderConfiguration::T5 { t5 } => Node::new("CLIPLoader", "CLIP Loader")
            .with("clip_name", t5.as_str())
            .with("type", "sd3"),
    }
}

fn graph(
    model: &str,
    encoders: &EncoderConfiguration,
    params: &SamplingParams,
    prefix: &str,
) -> Result<BuiltWorkflow> {
    let mut graph = WorkflowGraph::new();
    let mut bindings = ParameterBindings::new();

    let checkpoint = graph.add(Node::new("CheckpointLoaderSimple", "Load Checkpoint").with("ckpt_name", model));
    let clip = graph.add(encoder_loader(encoders));
    let positive = text_encode(&mut graph, "Positive Prompt", clip, &params.prompt);
    let negative = text_encode(&mut graph, "Negative Prompt", clip, &params.negative_prompt);
    let latent = graph.add(
        Node::new("EmptySD3LatentImage", "Empty Latent Image")
            .with("width", params.width)
            .with("height", params.height)
            .with("batch_size", 1),
    );
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
            .with("denoise", 1.0),
    );
    let decode = graph.add(
        Node::new("VAEDecode", "VAE Decode")
            .link("samples", sampler, 0)
            .link("vae", checkpoint, 2),
    );
    let save = graph.add(save_image(prefix, decode));

    bindings.bind(ParamName::Prompt, positive, "text");
    bindings.bind(ParamName::NegativePrompt, negative, "text");
    bindings.bind(ParamName::Width, latent, "width");
    bindings.bind(ParamName::Height, latent, "height");
    bindings.bind(ParamName::Steps, sampler, "steps");
    bindings.bind(ParamName::Seed, sampler, "seed");
    bindings.bind(ParamName::Cfg, sampler, "cfg");
    bindings.bind(ParamName::SamplerName, sampler, "sampler_name");
    bindings.bind(ParamName::Scheduler, sampler, "scheduler");

    BuiltWorkflow::new(graph, vec![save], bindings)
}

fn text_encode(graph: &mut WorkflowGraph, title: &str, clip: NodeId, text: &str) -> NodeId {
    graph.add(Node::new("CLIPTextEncode", title).link("clip", clip, 0).with("text", text))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use serde_json::json;

    const CLIP_L: &str = "clip_l.safetensors";
    const CLIP_G: &str = "clip_g.safetensors";
    const T5: &str = "t5xxl_fp16.safetensors";

    async fn loader_class(encoders: &[&str]) -> Result<String> {
        let ctx = context(encoders, &[]);
        let workflow = build("sd3.5_large.safetensors", &GenerationParams::new("a fox"), &ctx).await?;
        assert_well_formed(&workflow);
        let (_, loader) = workflow.graph().iter().nth(1).unwrap();
        Ok(loader.class_type.clone())
    }

    #[tokio::test]
    async fn test_encoder_fallback_order() {
        assert_eq!(loader_class(&[CLIP_L, CLIP_G, T5]).await.unwrap(), "TripleCLIPLoader");
        assert_eq!(loader_class(&[CLIP_L, CLIP_G]).await.unwrap(), "DualCLIPLoader");
        assert_eq!(loader_class(&[T5]).await.unwrap(), "CLIPLoader");
        assert_eq!(loader_class(&[CLIP_L, T5]).await.unwrap(), "CLIPLoader");
    }

    #[tokio::test]
    async fn test_no_encoders_fails() {
        let err = loader_class(&[]).await.unwrap_err();
        assert_eq!(err.reason_code(), "MISSING_ENCODER");
        assert_eq!(err.detail("model"), Some(&json!("sd3.5_large.safetensors")));

        let err = loader_class(&[CLIP_L]).await.unwrap_err();
        assert_eq!(err.reason_code(), "MISSING_ENCODER");
    }

    #[tokio::test]
    async fn test_only_one_encoder_loader_emitted() {
        let ctx = context(&[CLIP_L, CLIP_G, T5], &[]);
        let workflow = build("sd3.5_large.safetensors", &GenerationParams::new("a fox"), &ctx).await.unwrap();
        let loaders = ["TripleCLIPLoader", "DualCLIPLoader", "CLIPLoader"]
            .iter()
            .map(|c| count_class(&workflow, c))
            .sum::<usize>();
        assert_eq!(loaders, 1);
        assert_eq!(count_class(&workflow, "CLIPTextEncode"), 2);
        assert_eq!(workflow.parameter(ParamName::Cfg), Some(&json!(4.0)));
        assert_eq!(workflow.parameter(ParamName::Scheduler), Some(&json!("sgm_uniform")));
    }

    #[tokio::test]
    async fn test_bindings_follow_set_parameter() {
        let ctx = context(&[T5], &[]);
        let mut workflow = build("sd3.5_medium.safetensors", &GenerationParams::new("a fox"), &ctx).await.unwrap();
        workflow.set_parameter(ParamName::Width, 768).unwrap();
        let (_, latent) = workflow.graph().nodes_of_class("EmptySD3LatentImage").next().unwrap();
        assert_eq!(latent.value("width"), Some(&json!(768)));
    }
}
