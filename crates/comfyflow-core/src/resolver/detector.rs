//! Filename-based model classification.
//!
//! Used for files that are installed on the backend but missing from the
//! registry. Detected entries get priority 10 so that any registered file of
//! the same variant is preferred.

use comfyflow_abstraction::{Result, UtilsError, UtilsReason};

use crate::registry::{ModelFamily, ModelRegistry, ModelVariant, Precision, RegistryEntry};

/// Priority assigned to detected (unregistered) models.
pub const DETECTED_PRIORITY: u8 = 10;

/// Classifies a filename by the markers in its name.
pub fn detect(filename: &str) -> Option<RegistryEntry> {
    let name = filename.to_lowercase();

    let (family, variant) = if name.contains("flux") {
        let variant = if name.contains("schnell") {
            ModelVariant::Schnell
        } else if name.contains("kontext") {
            ModelVariant::Kontext
        } else if name.contains("krea") {
            ModelVariant::Krea
        } else {
            ModelVariant::Dev
        };
        (ModelFamily::Flux, variant)
    } else if name.contains("sd3") {
        let variant = if name.contains("incl") {
            ModelVariant::Sd35Inclclip
        } else {
            ModelVariant::Sd35
        };
        (ModelFamily::Sd3, variant)
    } else if name.contains("xl") {
        (ModelFamily::Sdxl, ModelVariant::Sdxl)
    } else if ["v1-5", "v1.5", "sd15", "sd1.5", "sd_1.5"].iter().any(|m| name.contains(m)) {
        (ModelFamily::Sd1, ModelVariant::Sd15)
    } else {
        return None;
    };

    let precision = if name.contains("e5m2") {
        Precision::Fp8E5m2
    } else if name.contains("fp8") {
        Precision::Fp8E4m3fn
    } else {
        Precision::Default
    };

    Some(RegistryEntry::new(family, variant, DETECTED_PRIORITY, precision))
}

/// Returns the registry entry of `filename`, falling back to detection.
///
/// # Errors
/// Returns a `Utils` error with reason `DETECTION_FAILED` when the file is
/// neither registered nor recognizable.
pub fn entry_for(filename: &str) -> Result<RegistryEntry> {
    if let Some(entry) = ModelRegistry::global().get(filename) {
        return Ok(*entry);
    }
    detect(filename).ok_or_else(|| {
        UtilsError::new(
            UtilsReason::DetectionFailed,
            format!("Unable to detect model type for {}", filename),
        )
        .with_detail("filename", filename)
        .into()
    })
}
