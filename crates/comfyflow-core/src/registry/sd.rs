//! Stable Diffusion model catalog (SD3.5, SDXL, SD1.5).

use std::collections::BTreeMap;

use super::{ModelFamily, ModelVariant, Precision, RegistryEntry};

/// Filename the user-supplied custom checkpoint is installed under.
pub const CUSTOM_SD_FILENAME: &str = "custom_sd_lobe.safetensors";

/// Optional autoencoder shipped alongside the custom checkpoint.
pub const CUSTOM_SD_VAE_FILENAME: &str = "custom_sd_lobe_vae.safetensors";

const SD_MODELS: &[(&str, ModelFamily, ModelVariant, u8)] = &[
    // SD3.5, encoders loaded separately
    ("sd3.5_large.safetensors", ModelFamily::Sd3, ModelVariant::Sd35, 1),
    ("sd3.5_medium.safetensors", ModelFamily::Sd3, ModelVariant::Sd35, 2),
    ("sd3.5_large_turbo.safetensors", ModelFamily::Sd3, ModelVariant::Sd35, 2),
    // SD3.5 with bundled encoders
    ("sd3.5_large_fp8_scaled.safetensors", ModelFamily::Sd3, ModelVariant::Sd35Inclclip, 1),
    ("sd3.5_large_inclclip.safetensors", ModelFamily::Sd3, ModelVariant::Sd35Inclclip, 1),
    ("sd3.5_medium_incl_clips_t5xxlfp8scaled.safetensors", ModelFamily::Sd3, ModelVariant::Sd35Inclclip, 2),
    // SDXL
    ("sd_xl_base_1.0.safetensors", ModelFamily::Sdxl, ModelVariant::Sdxl, 1),
    ("sd_xl_refiner_1.0.safetensors", ModelFamily::Sdxl, ModelVariant::Sdxl, 2),
    ("sd_xl_turbo_1.0_fp16.safetensors", ModelFamily::Sdxl, ModelVariant::Sdxl, 2),
    ("juggernautXL_v9Rdphoto2Lightning.safetensors", ModelFamily::Sdxl, ModelVariant::Sdxl, 3),
    ("RealVisXL_V4.0.safetensors", ModelFamily::Sdxl, ModelVariant::Sdxl, 3),
    (CUSTOM_SD_FILENAME, ModelFamily::Sdxl, ModelVariant::CustomSd, 1),
    // SD1.5
    ("v1-5-pruned-emaonly.safetensors", ModelFamily::Sd1, ModelVariant::Sd15, 1),
    ("v1-5-pruned-emaonly-fp16.safetensors", ModelFamily::Sd1, ModelVariant::Sd15, 1),
    ("v1-5-pruned.safetensors", ModelFamily::Sd1, ModelVariant::Sd15, 2),
    ("dreamshaper_8.safetensors", ModelFamily::Sd1, ModelVariant::Sd15, 3),
    ("realisticVisionV60B1_v51HyperVAE.safetensors", ModelFamily::Sd1, ModelVariant::Sd15, 3),
];

pub(super) fn register(entries: &mut BTreeMap<String, RegistryEntry>) {
    for (name, family, variant, priority) in SD_MODELS {
        entries.insert(
            (*name).to_string(),
            RegistryEntry::new(*family, *variant, *priority, Precision::Default),
        );
    }
}
