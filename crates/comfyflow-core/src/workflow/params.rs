//! Generation parameters and per-pipeline defaults.

use comfyflow_abstraction::{EngineError, Result, SeedGenerator, WorkflowError, WorkflowReason};
use serde::{Deserialize, Serialize};

/// Largest accepted image edge in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// Largest accepted sampling step count.
pub const MAX_STEPS: u32 = 10_000;

/// Caller-supplied generation parameters. Absent fields take the pipeline's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub seed: Option<u64>,
    pub cfg: Option<f64>,
    pub sampler_name: Option<String>,
    pub scheduler: Option<String>,
    /// Source image for image-to-image and reference pipelines.
    #[serde(alias = "imageUrl")]
    pub image: Option<String>,
    /// Alternative source list; the first entry is used when `image` is unset.
    pub image_urls: Vec<String>,
    /// Denoise strength for image-to-image, 0..=1.
    #[serde(alias = "denoise")]
    pub strength: Option<f64>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// The source image, if any.
    pub fn source_image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or_else(|| self.image_urls.first().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
    }

    /// Applies `defaults`, draws a seed when none was given and validates the
    /// result.
    ///
    /// # Errors
    /// `INVALID_PARAMS` with the offending `field` in details.
    pub fn resolve(&self, defaults: &ModelDefaults, seeds: &dyn SeedGenerator) -> Result<SamplingParams> {
        let width = self.width.unwrap_or(defaults.width);
        let height = self.height.unwrap_or(defaults.height);
        let steps = self.steps.unwrap_or(defaults.steps);
        let cfg = self.cfg.unwrap_or(defaults.cfg);
        let strength = self.strength.unwrap_or(defaults.strength);

        for (field, value) in [("width", width), ("height", height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(invalid(field, format!("{} must be between 1 and {}", field, MAX_DIMENSION)));
            }
        }
        if steps == 0 || steps > MAX_STEPS {
            return Err(invalid("steps", format!("steps must be between 1 and {}", MAX_STEPS)));
        }
        if !cfg.is_finite() || cfg < 0.0 {
            return Err(invalid("cfg", "cfg must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&strength) {
            return Err(invalid("strength", "strength must be between 0 and 1"));
        }

        let seed = match self.seed {
            Some(seed) => seed,
            None => seeds.generate_seeds(1).first().copied().unwrap_or_default(),
        };

        Ok(SamplingParams {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone().unwrap_or_default(),
            width,
            height,
            steps,
            seed,
            cfg,
            sampler_name: self.sampler_name.clone().unwrap_or_else(|| defaults.sampler_name.to_string()),
            scheduler: self.scheduler.clone().unwrap_or_else(|| defaults.scheduler.to_string()),
            image: self.source_image().map(str::to_string),
            strength,
        })
    }
}

pub(crate) fn invalid(field: &str, message: impl Into<String>) -> EngineError {
    WorkflowError::new(WorkflowReason::InvalidParams, message).with_detail("field", field).into()
}

/// Default sampling settings of one pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDefaults {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub sampler_name: &'static str,
    pub scheduler: &'static str,
    /// Denoise applied to a source image.
    pub strength: f64,
}

impl ModelDefaults {
    pub const FLUX_DEV: Self = Self::square(1024, 20, 3.5, "euler", "simple");
    pub const FLUX_SCHNELL: Self = Self::square(1024, 4, 1.0, "euler", "simple");
    pub const FLUX_KONTEXT: Self = Self::square(1024, 28, 2.5, "euler", "simple").with_strength(0.8);
    pub const SD35: Self = Self::square(1024, 20, 4.0, "euler", "sgm_uniform");
    pub const SDXL: Self = Self::square(1024, 20, 7.5, "euler", "normal");
    pub const SD15: Self = Self::square(512, 20, 7.0, "euler", "normal");

    const fn square(size: u32, steps: u32, cfg: f64, sampler_name: &'static str, scheduler: &'static str) -> Self {
        Self { width: size, height: size, steps, cfg, sampler_name, scheduler, strength: 1.0 }
    }

    const fn with_strength(self, strength: f64) -> Self {
        Self { strength, ..self }
    }
}

/// Fully resolved sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: u64,
    pub cfg: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub image: Option<String>,
    pub strength: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FixedSeedGenerator;
    use serde_json::json;

    #[test]
    fn test_defaults_applied() {
        let params = GenerationParams::new("a cat");
        let resolved = params.resolve(&ModelDefaults::SD15, &FixedSeedGenerator(99)).unwrap();
        assert_eq!(resolved.width, 512);
        assert_eq!(resolved.steps, 20);
        assert_eq!(resolved.seed, 99);
        assert_eq!(resolved.scheduler, "normal");
        assert_eq!(resolved.negative_prompt, "");
        assert!((resolved.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_explicit_values_win() {
        let params = GenerationParams {
            width: Some(768),
            seed: Some(5),
            sampler_name: Some("dpmpp_2m".to_string()),
            ..GenerationParams::new("a cat")
        };
        let resolved = params.resolve(&ModelDefaults::FLUX_DEV, &FixedSeedGenerator(99)).unwrap();
        assert_eq!(resolved.width, 768);
        assert_eq!(resolved.height, 1024);
        assert_eq!(resolved.seed, 5);
        assert_eq!(resolved.sampler_name, "dpmpp_2m");
    }

    #[test]
    fn test_invalid_values() {
        let seeds = FixedSeedGenerator(0);
        let cases = [
            ("width", GenerationParams { width: Some(0), ..Default::default() }),
            ("height", GenerationParams { height: Some(MAX_DIMENSION + 8), ..Default::default() }),
            ("steps", GenerationParams { steps: Some(0), ..Default::default() }),
            ("cfg", GenerationParams { cfg: Some(f64::NAN), ..Default::default() }),
            ("strength", GenerationParams { strength: Some(1.5), ..Default::default() }),
        ];
        for (field, params) in cases {
            let err = params.resolve(&ModelDefaults::SDXL, &seeds).unwrap_err();
            assert_eq!(err.reason_code(), "INVALID_PARAMS");
            assert_eq!(err.detail("field"), Some(&json!(field)));
        }
    }

    #[test]
    fn test_kontext_defaults_to_partial_denoise() {
        let resolved = GenerationParams::new("x").resolve(&ModelDefaults::FLUX_KONTEXT, &FixedSeedGenerator(1)).unwrap();
        assert!((resolved.strength - 0.8).abs() < f64::EPSILON);

        let explicit = GenerationParams { strength: Some(0.35), ..GenerationParams::new("x") };
        let resolved = explicit.resolve(&ModelDefaults::FLUX_KONTEXT, &FixedSeedGenerator(1)).unwrap();
        assert!((resolved.strength - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialize_aliases() {
        let params: GenerationParams = serde_json::from_value(json!({
            "prompt": "a cat",
            "imageUrl": "cat.png",
            "denoise": 0.6,
            "samplerName": "euler"
        }))
        .unwrap();
        assert_eq!(params.image.as_deref(), Some("cat.png"));
        assert_eq!(params.strength, Some(0.6));
        assert_eq!(params.sampler_name.as_deref(), Some("euler"));
    }

    #[test]
    fn test_source_image_falls_back_to_list() {
        let params = GenerationParams { image_urls: vec!["a.png".into(), "b.png".into()], ..Default::default() };
        assert_eq!(params.source_image(), Some("a.png"));

        let blank = GenerationParams { image: Some(" ".into()), ..Default::default() };
        assert_eq!(blank.source_image(), None);
    }
}
