//! FLUX kontext pipeline: the dev graph with an optional reference image,
//! denoised at `strength` (0.8 unless given).

use comfyflow_abstraction::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::{BuildContext, FluxComponents, flux_dev};
use crate::workflow::built::BuiltWorkflow;
use crate::workflow::params::{GenerationParams, ModelDefaults};

pub fn build<'a>(
    model: &'a str,
    params: &'a GenerationParams,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<BuiltWorkflow>> {
    async move {
        let sampling = ctx.resolve_params(params, &ModelDefaults::FLUX_KONTEXT)?;
        let components = FluxComponents::resolve(ctx, model).await?;
        debug!(model = %model, reference = sampling.image.is_some(), "Building FLUX kontext workflow");
        flux_dev::graph(model, &components, &sampling, &ctx.filename_prefix, sampling.image.as_deref())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::workflow::built::ParamName;
    use serde_json::json;

    #[tokio::test]
    async fn test_reference_image_chain() {
        let ctx = flux_context();
        let params = GenerationParams {
            image_urls: vec!["input.png".to_string()],
            ..GenerationParams::new("make it snow")
        };
        let workflow = build("flux1-kontext-dev.safetensors", &params, &ctx).await.unwrap();

        assert_well_formed(&workflow);
        assert_eq!(count_class(&workflow, "LoadImage"), 1);
        assert_eq!(count_class(&workflow, "ImageScale"), 1);
        assert_eq!(count_class(&workflow, "ReferenceLatent"), 1);
        assert_eq!(count_class(&workflow, "EmptySD3LatentImage"), 0);
        assert_eq!(workflow.graph().len(), 17);

        let (reference, _) = workflow.graph().nodes_of_class("ReferenceLatent").next().unwrap();
        let (_, guider) = workflow.graph().nodes_of_class("BasicGuider").next().unwrap();
        assert_eq!(guider.input("conditioning").and_then(|i| i.as_link()).map(|l| l.node), Some(reference));

        let (_, load) = workflow.graph().nodes_of_class("LoadImage").next().unwrap();
        assert_eq!(load.value("image"), Some(&json!("input.png")));
        assert_eq!(workflow.parameter(ParamName::Cfg), Some(&json!(2.5)));
    }

    #[tokio::test]
    async fn test_reference_denoised_at_strength() {
        let ctx = flux_context();
        let params = GenerationParams {
            image: Some("input.png".to_string()),
            strength: Some(0.35),
            ..GenerationParams::new("make it snow")
        };
        let workflow = build("flux1-kontext-dev.safetensors", &params, &ctx).await.unwrap();

        let (_, scheduler) = workflow.graph().nodes_of_class("BasicScheduler").next().unwrap();
        assert_eq!(scheduler.value("denoise"), Some(&json!(0.35)));
        assert_eq!(workflow.parameter(ParamName::Strength), Some(&json!(0.35)));

        let (encoded, _) = workflow.graph().nodes_of_class("VAEEncode").next().unwrap();
        let (_, sample) = workflow.graph().nodes_of_class("SamplerCustomAdvanced").next().unwrap();
        assert_eq!(sample.input("latent_image").and_then(|i| i.as_link()).map(|l| l.node), Some(encoded));
    }

    #[tokio::test]
    async fn test_reference_strength_default() {
        let ctx = flux_context();
        let params = GenerationParams { image: Some("input.png".to_string()), ..GenerationParams::new("x") };
        let workflow = build("flux1-kontext-dev.safetensors", &params, &ctx).await.unwrap();
        assert_eq!(workflow.parameter(ParamName::Strength), Some(&json!(0.8)));
    }

    #[tokio::test]
    async fn test_reference_scaled_to_requested_size() {
        let ctx = flux_context();
        let params = GenerationParams {
            image: Some("input.png".to_string()),
            width: Some(4000),
            height: Some(300),
            ..GenerationParams::new("x")
        };
        let workflow = build("flux1-kontext-dev.safetensors", &params, &ctx).await.unwrap();

        let (_, scale) = workflow.graph().nodes_of_class("ImageScale").next().unwrap();
        assert_eq!(scale.value("width"), Some(&json!(1440)));
        assert_eq!(scale.value("height"), Some(&json!(608)));
        let (_, sampling) = workflow.graph().nodes_of_class("ModelSamplingFlux").next().unwrap();
        assert_eq!(sampling.value("width"), Some(&json!(1440)));
        assert_eq!(workflow.parameter(ParamName::Height), Some(&json!(608)));
    }

    #[tokio::test]
    async fn test_without_reference_matches_dev_shape() {
        let ctx = flux_context();
        let workflow = build("flux1-kontext-dev.safetensors", &GenerationParams::new("a fox"), &ctx)
            .await
            .unwrap();
        assert_eq!(count_class(&workflow, "ReferenceLatent"), 0);
        assert_eq!(workflow.graph().len(), 14);
        assert!(!workflow.bindings().contains(ParamName::Strength));
    }
}
