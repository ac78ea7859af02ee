//! Live model resolution against the backend inventory.
//!
//! Where [`ModelRegistry::resolve`] is a pure lookup, [`ModelResolver`] asks
//! the backend which files are actually installed and maps frontend model ids
//! (`comfyui/flux-schnell`) to one of them.

pub mod components;
pub mod detector;

use comfyflow_abstraction::{
    EngineError, Inventory, InventoryCategory, ModelResolverError, ModelResolverReason, Result,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::registry::{
    CUSTOM_SD_FILENAME, MatchMode, ModelRegistry, ModelVariant, ResolvedModel,
    variant_for_model_id,
};

pub use components::{ComponentResolver, ComponentRole, EncoderConfiguration};

/// Prefix the frontend puts in front of model ids.
pub const MODEL_ID_PREFIX: &str = "comfyui/";

/// Strips one leading [`MODEL_ID_PREFIX`].
pub fn strip_model_id_prefix(model_id: &str) -> &str {
    model_id.strip_prefix(MODEL_ID_PREFIX).unwrap_or(model_id)
}

/// Resolves model ids to installed files.
#[derive(Clone)]
pub struct ModelResolver {
    inventory: Arc<dyn Inventory>,
    registry: &'static ModelRegistry,
}

impl fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelResolver").field("registry_len", &self.registry.len()).finish()
    }
}

impl ModelResolver {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self { inventory, registry: ModelRegistry::global() }
    }

    /// Lists the installed main model files: checkpoints, then standalone
    /// diffusion models.
    async fn installed_models(&self) -> Result<Vec<String>> {
        let (checkpoints, diffusion) = futures::try_join!(
            self.inventory.list_files(InventoryCategory::Checkpoints),
            self.inventory.list_files(InventoryCategory::DiffusionModels),
        )?;
        let mut files = checkpoints;
        for file in diffusion {
            if !files.contains(&file) {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// Maps a model id or filename to an installed file.
    ///
    /// Resolution order: the custom checkpoint for custom ids, the id itself
    /// when it names an installed file, then the installed file of the id's
    /// variant with the best priority. `Ok(None)` means nothing suitable is
    /// installed.
    pub async fn resolve_model_file(&self, model_id: &str) -> Result<Option<String>> {
        let id = strip_model_id_prefix(model_id);
        let variant = variant_for_model_id(id);

        if variant == Some(ModelVariant::CustomSd) {
            let present =
                self.inventory.contains(InventoryCategory::Checkpoints, CUSTOM_SD_FILENAME).await?;
            return Ok(present.then(|| CUSTOM_SD_FILENAME.to_string()));
        }

        let installed = self.installed_models().await?;
        if installed.iter().any(|f| f == id) {
            return Ok(Some(id.to_string()));
        }

        let Some(variant) = variant else {
            debug!(model_id = %model_id, "Model id has no known variant");
            return Ok(None);
        };

        let found = self
            .registry
            .by_variant(variant.as_str())
            .into_iter()
            .find(|name| installed.iter().any(|f| f == name))
            .map(str::to_string);
        debug!(model_id = %model_id, variant = %variant, file = ?found, "Resolved model file");
        Ok(found)
    }

    /// Resolves `model_id` to an installed file and describes it.
    ///
    /// # Errors
    /// - `INVALID_MODEL_FORMAT` for empty or path-like ids
    /// - `MODEL_NOT_FOUND` when no suitable file is installed; details carry
    ///   `modelId`, `variant` and the best-priority `expectedFiles`
    /// - `DETECTION_FAILED` when the installed file cannot be classified
    /// - inventory failures unchanged
    pub async fn validate_model(&self, model_id: &str) -> Result<ResolvedModel> {
        let id = strip_model_id_prefix(model_id.trim());
        if id.is_empty() || id.contains('/') || id.contains('\\') {
            return Err(ModelResolverError::new(
                ModelResolverReason::InvalidModelFormat,
                format!("Invalid model id: {:?}", model_id),
            )
            .with_detail("modelId", model_id)
            .into());
        }

        let Some(filename) = self.resolve_model_file(id).await? else {
            return Err(self.not_found(id));
        };

        let entry = match self.registry.get(&filename) {
            Some(entry) => *entry,
            None => {
                warn!(file = %filename, "Installed model is not registered, detecting type");
                detector::entry_for(&filename)?
            }
        };

        info!(model_id = %model_id, file = %filename, family = %entry.model_family, "Model validated");
        Ok(ResolvedModel {
            requested_identifier: model_id.to_string(),
            matched_filename: filename,
            entry,
            match_mode: MatchMode::Exact,
        })
    }

    fn not_found(&self, id: &str) -> EngineError {
        let variant = variant_for_model_id(id);
        let expected: Vec<&str> = variant
            .map(|v| {
                let files = self.registry.by_variant(v.as_str());
                let best = files.first().and_then(|f| self.registry.get(f)).map(|e| e.priority);
                files
                    .into_iter()
                    .filter(|f| self.registry.get(f).map(|e| e.priority) == best)
                    .collect()
            })
            .unwrap_or_default();

        ModelResolverError::new(
            ModelResolverReason::ModelNotFound,
            format!("Model not found: {}, please install one first.", expected.join(", ")),
        )
        .with_detail("modelId", id)
        .with_detail("variant", json!(variant.map(ModelVariant::as_str)))
        .with_detail("expectedFiles", json!(expected))
        .into()
    }

    /// Lists every installed main model file.
    ///
    /// # Errors
    /// `NO_MODELS_AVAILABLE` when the backend reports none.
    pub async fn list_model_files(&self) -> Result<Vec<String>> {
        let files = self.installed_models().await?;
        if files.is_empty() {
            return Err(ModelResolverError::new(
                ModelResolverReason::NoModelsAvailable,
                "No models available on the backend",
            )
            .into());
        }
        Ok(files)
    }

    /// Lists installed autoencoders.
    pub async fn available_vae_files(&self) -> Result<Vec<String>> {
        self.inventory.list_files(InventoryCategory::Vae).await
    }

    /// Lists the installed files of an auxiliary category.
    pub async fn available_component_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
        self.inventory.list_files(category).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::StaticInventory;
    use crate::registry::ModelFamily;
    use comfyflow_abstraction::ServicesReason;

    fn resolver_for(checkpoints: &[&str], diffusion: &[&str]) -> ModelResolver {
        let inventory = StaticInventory::new()
            .with_files(InventoryCategory::Checkpoints, checkpoints.iter().copied())
            .with_files(InventoryCategory::DiffusionModels, diffusion.iter().copied());
        ModelResolver::new(Arc::new(inventory))
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_model_id_prefix("comfyui/flux-dev"), "flux-dev");
        assert_eq!(strip_model_id_prefix("flux-dev"), "flux-dev");
        assert_eq!(strip_model_id_prefix("comfyui/comfyui/x"), "comfyui/x");
    }

    #[tokio::test]
    async fn test_resolves_best_installed_variant_file() {
        let resolver = resolver_for(&[], &["flux1-schnell-fp8.safetensors", "flux1-schnell.safetensors"]);
        let file = resolver.resolve_model_file("comfyui/flux-schnell").await.unwrap();
        assert_eq!(file.as_deref(), Some("flux1-schnell.safetensors"));
    }

    #[tokio::test]
    async fn test_installed_filename_resolves_to_itself() {
        let resolver = resolver_for(&["dreamshaper_8.safetensors"], &[]);
        let file = resolver.resolve_model_file("dreamshaper_8.safetensors").await.unwrap();
        assert_eq!(file.as_deref(), Some("dreamshaper_8.safetensors"));
    }

    #[tokio::test]
    async fn test_custom_sd_requires_custom_file() {
        let resolver_without = resolver_for(&["sd_xl_base_1.0.safetensors"], &[]);
        assert_eq!(resolver_without.resolve_model_file("stable-diffusion-custom").await.unwrap(), None);

        let resolver_with = resolver_for(&[CUSTOM_SD_FILENAME], &[]);
        let file = resolver_with.resolve_model_file("comfyui/stable-diffusion-custom-refiner").await.unwrap();
        assert_eq!(file.as_deref(), Some(CUSTOM_SD_FILENAME));
    }

    #[tokio::test]
    async fn test_validate_model_describes_file() {
        let resolver = resolver_for(&["sd_xl_base_1.0.safetensors"], &[]);
        let resolved = resolver.validate_model("comfyui/stable-diffusion-xl").await.unwrap();
        assert_eq!(resolved.requested_identifier, "comfyui/stable-diffusion-xl");
        assert_eq!(resolved.matched_filename, "sd_xl_base_1.0.safetensors");
        assert_eq!(resolved.entry.model_family, ModelFamily::Sdxl);
    }

    #[tokio::test]
    async fn test_validate_model_detects_unregistered_file() {
        let resolver = resolver_for(&["my-flux-finetune.safetensors"], &[]);
        let resolved = resolver.validate_model("my-flux-finetune.safetensors").await.unwrap();
        assert_eq!(resolved.entry.model_family, ModelFamily::Flux);
        assert_eq!(resolved.entry.priority, detector::DETECTED_PRIORITY);

        let resolver = resolver_for(&["mystery.safetensors"], &[]);
        let err = resolver.validate_model("mystery.safetensors").await.unwrap_err();
        assert_eq!(err.reason_code(), "DETECTION_FAILED");
    }

    #[tokio::test]
    async fn test_model_not_found_lists_expected_files() {
        let resolver = resolver_for(&[], &[]);
        let err = resolver.validate_model("comfyui/flux-schnell").await.unwrap_err();
        assert_eq!(err.reason_code(), "MODEL_NOT_FOUND");
        assert_eq!(
            err.message(),
            "Model not found: flux1-schnell.safetensors, please install one first."
        );
        assert_eq!(err.detail("modelId"), Some(&json!("flux-schnell")));
        assert_eq!(err.detail("variant"), Some(&json!("schnell")));
        assert_eq!(err.detail("expectedFiles"), Some(&json!(["flux1-schnell.safetensors"])));
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let resolver = resolver_for(&["flux1-dev.safetensors"], &[]);
        let err = resolver.validate_model("unknown-model").await.unwrap_err();
        assert_eq!(err.reason_code(), "MODEL_NOT_FOUND");
        assert_eq!(err.message(), "Model not found: , please install one first.");
        assert_eq!(err.detail("variant"), Some(&json!(null)));
        assert_eq!(err.detail("expectedFiles"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_invalid_model_format() {
        let resolver = resolver_for(&["flux1-dev.safetensors"], &[]);
        for id in ["", "   ", "comfyui/", "models/flux1-dev.safetensors", "..\\x"] {
            let err = resolver.validate_model(id).await.unwrap_err();
            assert_eq!(err.reason_code(), "INVALID_MODEL_FORMAT", "{:?}", id);
        }
    }

    #[tokio::test]
    async fn test_inventory_errors_propagate() {
        let inventory = StaticInventory::new().failing(ServicesReason::InvalidAuth);
        let resolver = ModelResolver::new(Arc::new(inventory));
        let err = resolver.validate_model("flux-dev").await.unwrap_err();
        assert!(err.is_services(ServicesReason::InvalidAuth));
    }

    #[tokio::test]
    async fn test_list_model_files() {
        let resolver = resolver_for(&["a.safetensors"], &["b.safetensors", "a.safetensors"]);
        assert_eq!(resolver.list_model_files().await.unwrap(), vec!["a.safetensors", "b.safetensors"]);

        let err = resolver_for(&[], &[]).list_model_files().await.unwrap_err();
        assert_eq!(err.reason_code(), "NO_MODELS_AVAILABLE");
    }
}
