//! FLUX model catalog.

use std::collections::BTreeMap;

use super::{ModelFamily, ModelVariant, Precision, RegistryEntry};

use ModelVariant::{Dev, Kontext, Krea, Schnell};
use Precision::{Default as Std, Fp8E4m3fn, Fp8E5m2};

/// GGUF quantization levels published for every official variant.
const GGUF_LEVELS: [&str; 11] =
    ["F16", "Q8_0", "Q6_K", "Q5_K_M", "Q5_K_S", "Q4_K_M", "Q4_K_S", "Q4_0", "Q3_K_M", "Q3_K_S", "Q2_K"];

/// Official releases.
const OFFICIAL: &[(&str, ModelVariant)] = &[
    ("flux1-dev.safetensors", Dev),
    ("flux1-schnell.safetensors", Schnell),
    ("flux1-kontext-dev.safetensors", Kontext),
    ("flux1-krea-dev.safetensors", Krea),
];

/// Distilled, quantized and experimental builds of the official weights.
const DERIVED: &[(&str, ModelVariant, Precision)] = &[
    ("flux.1-lite-8B.safetensors", Dev, Std),
    ("flux.1-lite-8B-alpha.safetensors", Dev, Std),
    ("flux-mini.safetensors", Dev, Std),
    ("FLUX_Mini_3_2B.safetensors", Dev, Std),
    ("flux_shakker_labs_union_pro-fp8_e4m3fn.safetensors", Dev, Fp8E4m3fn),
    ("flux1-dev-fp8.safetensors", Dev, Fp8E4m3fn),
    ("flux1-dev-fp8-e4m3fn.safetensors", Dev, Fp8E4m3fn),
    ("flux1-dev-fp8-e5m2.safetensors", Dev, Fp8E5m2),
    ("flux1-schnell-fp8.safetensors", Schnell, Fp8E4m3fn),
    ("flux1-schnell-fp8-e4m3fn.safetensors", Schnell, Fp8E4m3fn),
    ("flux1-schnell-fp8-e5m2.safetensors", Schnell, Fp8E5m2),
    ("flux1-dev-kontext_fp8_scaled.safetensors", Kontext, Fp8E4m3fn),
    ("flux1-kontext-dev-fp8-e4m3fn.safetensors", Kontext, Fp8E4m3fn),
    ("flux1-kontext-dev-fp8-e5m2.safetensors", Kontext, Fp8E5m2),
    ("flux1-krea-dev_fp8_scaled.safetensors", Krea, Fp8E4m3fn),
    ("flux1-krea-dev-fp8-e4m3fn.safetensors", Krea, Fp8E4m3fn),
    ("flux1-krea-dev-fp8-e5m2.safetensors", Krea, Fp8E5m2),
    ("flux1-dev-bnb-nf4.safetensors", Dev, Std),
    ("flux1-dev-bnb-nf4-v2.safetensors", Dev, Std),
    ("flux1-schnell-bnb-nf4.safetensors", Schnell, Std),
    ("flux1-kontext-dev-bnb-nf4.safetensors", Kontext, Std),
    ("flux1-krea-dev-bnb-nf4.safetensors", Krea, Std),
    ("flux1-dev-svdquant-w4a4.safetensors", Dev, Std),
    ("flux1-schnell-svdquant-w4a4.safetensors", Schnell, Std),
    ("flux1-dev-torchao-int8.safetensors", Dev, Std),
    ("flux1-dev-torchao-int4.safetensors", Dev, Std),
    ("flux1-schnell-torchao-int8.safetensors", Schnell, Std),
    ("flux1-dev-quanto-qfloat8.safetensors", Dev, Std),
    ("flux1-schnell-quanto-qfloat8.safetensors", Schnell, Std),
    ("flux1-dev-mflux-q4.safetensors", Dev, Std),
    ("flux1-schnell-mflux-q4.safetensors", Schnell, Std),
];

/// Community fine-tunes.
const COMMUNITY: &[(&str, ModelVariant, Precision)] = &[
    ("Jib_Mix_Flux_v8_schnell.safetensors", Schnell, Std),
    ("Jib_mix_Flux_V11_Krea_b_00001_.safetensors", Dev, Std),
    ("jibMixFlux_v8.q4_0.gguf", Dev, Std),
    ("real_dream_flux_v1.safetensors", Dev, Std),
    ("real_dream_flux_beta.safetensors", Dev, Std),
    ("real_dream_flux_release.safetensors", Dev, Std),
    ("realDream_flux1V1.safetensors", Dev, Std),
    ("realDream_flux1V1_schnell.safetensors", Schnell, Std),
    ("vision_realistic_flux_dev_v2.safetensors", Dev, Std),
    ("vision_realistic_flux_dev_fp8_no_clip_v2.safetensors", Dev, Fp8E4m3fn),
    ("vision_realistic_flux_v2_fp8.safetensors", Dev, Fp8E4m3fn),
    ("vision_realistic_flux_v2_dev.safetensors", Dev, Std),
    ("vision_realistic_flux_shakker.safetensors", Dev, Std),
    ("flux_fusion_v2_4steps.safetensors", Dev, Std),
    ("flux_fusion_ds_merge.safetensors", Dev, Std),
    ("flux_fusion_v2_tensorart.safetensors", Dev, Std),
    ("PixelWave_FLUX.1-dev_03.safetensors", Dev, Std),
    ("PixelWave_FLUX.1-schnell_04.safetensors", Schnell, Std),
    ("Fux_Capacity_NSFW_v3.safetensors", Dev, Std),
    ("FuxCapacity2.1-Q8_0.gguf", Dev, Std),
    ("FuxCapacity3.0_FP8.safetensors", Dev, Fp8E4m3fn),
    ("FuxCapacity3.1_FP16.safetensors", Dev, Std),
    ("FluxMania_Kreamania_v1.safetensors", Krea, Std),
    ("Fluxmania_IV_fp8.safetensors", Dev, Fp8E4m3fn),
    ("Fluxmania_V6I.safetensors", Dev, Std),
    ("Fluxmania_V6I_fp16.safetensors", Dev, Std),
    ("commercial-flux-toolkit.safetensors", Krea, Std),
    ("flux-fill-object-removal.safetensors", Kontext, Std),
    ("flux-medical-environment-lora.safetensors", Kontext, Std),
    ("flux-schnell-dev-merged-fp8.safetensors", Schnell, Fp8E4m3fn),
    ("schnellMODE_FLUX_S_v5_1.safetensors", Schnell, Std),
    ("NF4_BnB_FLUX_dev_optimized.safetensors", Dev, Std),
];

const fn flux(variant: ModelVariant, priority: u8, precision: Precision) -> RegistryEntry {
    RegistryEntry::new(ModelFamily::Flux, variant, priority, precision)
}

pub(super) fn register(entries: &mut BTreeMap<String, RegistryEntry>) {
    for (name, variant) in OFFICIAL {
        entries.insert((*name).to_string(), flux(*variant, 1, Std));
    }

    for (stem, variant) in [
        ("flux1-dev", Dev),
        ("flux1-schnell", Schnell),
        ("flux1-kontext-dev", Kontext),
        ("flux1-krea-dev", Krea),
    ] {
        for level in GGUF_LEVELS {
            entries.insert(format!("{}-{}.gguf", stem, level), flux(variant, 2, Std));
        }
    }

    for (name, variant, precision) in DERIVED {
        entries.insert((*name).to_string(), flux(*variant, 2, *precision));
    }

    for (name, variant, precision) in COMMUNITY {
        entries.insert((*name).to_string(), flux(*variant, 3, *precision));
    }
}
