//! Auxiliary component resolution.
//!
//! Text encoders and autoencoders are picked from a static candidate table by
//! role, family affinity and priority, then confirmed against the backend
//! inventory.

use comfyflow_abstraction::{Inventory, InventoryCategory, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::registry::ModelFamily;

/// The logical slot a component fills in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    /// CLIP-L text encoder.
    ClipL,
    /// CLIP-G text encoder.
    ClipG,
    /// T5-XXL text encoder.
    T5,
    /// Autoencoder.
    Vae,
}

impl ComponentRole {
    /// The inventory category files of this role are listed in.
    pub const fn category(self) -> InventoryCategory {
        match self {
            Self::ClipL | Self::ClipG | Self::T5 => InventoryCategory::TextEncoders,
            Self::Vae => InventoryCategory::Vae,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClipL => "clip_l",
            Self::ClipG => "clip_g",
            Self::T5 => "t5",
            Self::Vae => "vae",
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the candidate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentCandidate {
    pub role: ComponentRole,
    /// Families the file suits; empty means any family.
    pub family_affinity: &'static [ModelFamily],
    /// Lower is preferred.
    pub priority: u8,
    pub filename: &'static str,
}

impl ComponentCandidate {
    fn suits(&self, family: ModelFamily) -> bool {
        self.family_affinity.is_empty() || self.family_affinity.contains(&family)
    }
}

const FLUX_SD3: &[ModelFamily] = &[ModelFamily::Flux, ModelFamily::Sd3];

const fn candidate(
    role: ComponentRole,
    family_affinity: &'static [ModelFamily],
    priority: u8,
    filename: &'static str,
) -> ComponentCandidate {
    ComponentCandidate { role, family_affinity, priority, filename }
}

/// The static candidate table.
pub const COMPONENT_CANDIDATES: &[ComponentCandidate] = &[
    candidate(ComponentRole::ClipL, FLUX_SD3, 1, "clip_l.safetensors"),
    candidate(ComponentRole::ClipG, &[ModelFamily::Sd3], 1, "clip_g.safetensors"),
    candidate(ComponentRole::T5, FLUX_SD3, 1, "t5xxl_fp16.safetensors"),
    candidate(ComponentRole::T5, FLUX_SD3, 2, "t5xxl_fp8_e4m3fn.safetensors"),
    candidate(ComponentRole::T5, FLUX_SD3, 3, "t5xxl_fp8_e4m3fn_scaled.safetensors"),
    candidate(ComponentRole::T5, FLUX_SD3, 4, "t5-v1_1-xxl-encoder.safetensors"),
    candidate(ComponentRole::Vae, &[ModelFamily::Flux], 1, "ae.safetensors"),
    candidate(ComponentRole::Vae, &[ModelFamily::Sdxl], 1, "sdxl_vae_fp16fix.safetensors"),
    candidate(ComponentRole::Vae, &[ModelFamily::Sdxl], 2, "sdxl_vae.safetensors"),
    candidate(ComponentRole::Vae, &[ModelFamily::Sd1], 1, "vae-ft-mse-840000-ema-pruned.safetensors"),
    candidate(ComponentRole::Vae, &[ModelFamily::Sd1], 2, "kl-f8-anime2.safetensors"),
];

/// Candidates for `role` and `family`, best first.
pub fn candidates(role: ComponentRole, family: ModelFamily) -> Vec<&'static ComponentCandidate> {
    let mut matching: Vec<_> =
        COMPONENT_CANDIDATES.iter().filter(|c| c.role == role && c.suits(family)).collect();
    matching.sort_by_key(|c| c.priority);
    matching
}

/// Text encoder setup of a multi-encoder pipeline.
///
/// A variant only exists when every one of its files is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EncoderConfiguration {
    #[serde(rename_all = "camelCase")]
    Triple { clip_l: String, clip_g: String, t5: String },
    #[serde(rename_all = "camelCase")]
    DualClip { clip_l: String, clip_g: String },
    T5 { t5: String },
}

impl EncoderConfiguration {
    /// Picks the most capable configuration: triple, then dual CLIP, then T5.
    pub fn select(
        clip_l: Option<String>,
        clip_g: Option<String>,
        t5: Option<String>,
    ) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (present(clip_l), present(clip_g), present(t5)) {
            (Some(clip_l), Some(clip_g), Some(t5)) => Some(Self::Triple { clip_l, clip_g, t5 }),
            (Some(clip_l), Some(clip_g), None) => Some(Self::DualClip { clip_l, clip_g }),
            (_, _, Some(t5)) => Some(Self::T5 { t5 }),
            _ => None,
        }
    }

    /// The wire tag of the configuration.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Triple { .. } => "triple",
            Self::DualClip { .. } => "dualClip",
            Self::T5 { .. } => "t5",
        }
    }
}

/// Finds the best installed component for a role.
#[derive(Clone)]
pub struct ComponentResolver {
    inventory: Arc<dyn Inventory>,
}

impl fmt::Debug for ComponentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentResolver").finish_non_exhaustive()
    }
}

impl ComponentResolver {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self { inventory }
    }

    /// The inventory components are confirmed against.
    pub fn inventory(&self) -> &Arc<dyn Inventory> {
        &self.inventory
    }

    /// Returns the highest-priority candidate installed on the backend.
    ///
    /// `Ok(None)` means no candidate is installed. Inventory failures are
    /// returned as-is.
    pub async fn optimal_component(
        &self,
        role: ComponentRole,
        family: ModelFamily,
    ) -> Result<Option<String>> {
        let wanted = candidates(role, family);
        if wanted.is_empty() {
            debug!(role = %role, family = %family, "No component candidates for family");
            return Ok(None);
        }

        let installed = self.inventory.list_files(role.category()).await?;
        let found = wanted
            .into_iter()
            .find(|c| installed.iter().any(|f| f == c.filename))
            .map(|c| c.filename.to_string());

        debug!(role = %role, family = %family, component = ?found, "Resolved component");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::StaticInventory;
    use comfyflow_abstraction::ServicesReason;

    fn resolver(encoders: &[&str], vaes: &[&str]) -> ComponentResolver {
        let inventory = StaticInventory::new()
            .with_files(InventoryCategory::TextEncoders, encoders.iter().copied())
            .with_files(InventoryCategory::Vae, vaes.iter().copied());
        ComponentResolver::new(Arc::new(inventory))
    }

    #[test]
    fn test_candidates_sorted_by_priority() {
        let t5 = candidates(ComponentRole::T5, ModelFamily::Flux);
        assert_eq!(t5[0].filename, "t5xxl_fp16.safetensors");
        assert!(t5.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn test_candidates_respect_affinity() {
        assert!(candidates(ComponentRole::ClipG, ModelFamily::Flux).is_empty());
        assert!(candidates(ComponentRole::Vae, ModelFamily::Sd3).is_empty());
        assert_eq!(candidates(ComponentRole::Vae, ModelFamily::Flux)[0].filename, "ae.safetensors");
    }

    #[tokio::test]
    async fn test_picks_best_installed() {
        let resolver = resolver(
            &["t5xxl_fp8_e4m3fn_scaled.safetensors", "t5xxl_fp8_e4m3fn.safetensors"],
            &[],
        );
        let t5 = resolver.optimal_component(ComponentRole::T5, ModelFamily::Flux).await.unwrap();
        assert_eq!(t5.as_deref(), Some("t5xxl_fp8_e4m3fn.safetensors"));
    }

    #[tokio::test]
    async fn test_absent_is_not_an_error() {
        let resolver = resolver(&[], &["ae.safetensors"]);
        let vae = resolver.optimal_component(ComponentRole::Vae, ModelFamily::Sdxl).await.unwrap();
        assert_eq!(vae, None);
        let clip = resolver.optimal_component(ComponentRole::ClipL, ModelFamily::Flux).await.unwrap();
        assert_eq!(clip, None);
    }

    #[tokio::test]
    async fn test_inventory_failure_is_services_error() {
        let inventory = StaticInventory::new().failing(ServicesReason::ServiceUnavailable);
        let resolver = ComponentResolver::new(Arc::new(inventory));
        let err = resolver.optimal_component(ComponentRole::Vae, ModelFamily::Flux).await.unwrap_err();
        assert!(err.is_services(ServicesReason::ServiceUnavailable));
    }

    #[test]
    fn test_encoder_selection_order() {
        let s = |v: &str| Some(v.to_string());

        let triple = EncoderConfiguration::select(s("l"), s("g"), s("t5")).unwrap();
        assert_eq!(triple.kind(), "triple");

        let dual = EncoderConfiguration::select(s("l"), s("g"), None).unwrap();
        assert_eq!(dual.kind(), "dualClip");

        let t5 = EncoderConfiguration::select(None, None, s("t5")).unwrap();
        assert_eq!(t5, EncoderConfiguration::T5 { t5: "t5".to_string() });

        let clip_l_and_t5 = EncoderConfiguration::select(s("l"), None, s("t5")).unwrap();
        assert_eq!(clip_l_and_t5.kind(), "t5");

        assert_eq!(EncoderConfiguration::select(s("l"), None, None), None);
        assert_eq!(EncoderConfiguration::select(s(""), s(""), s("")), None);
    }

    #[test]
    fn test_encoder_configuration_serde() {
        let config = EncoderConfiguration::DualClip { clip_l: "l".into(), clip_g: "g".into() };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["type"], "dualClip");
        assert_eq!(value["clipL"], "l");
    }
}
