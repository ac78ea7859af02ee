//! Maps a resolved `(family, variant)` pair to its workflow builder.

use comfyflow_abstraction::{Result, UtilsError, UtilsReason};
use serde_json::json;
use std::fmt;
use tracing::debug;

use super::builders::{BuilderFn, flux_dev, flux_kontext, flux_schnell, sd35, simple_sd};
use crate::registry::{ModelFamily, ModelRegistry, ModelVariant, ResolvedModel};

/// One routing table entry.
#[derive(Clone, Copy)]
pub struct Route {
    pub family: ModelFamily,
    pub variant: ModelVariant,
    /// Name of the builder, for logs and capability listings.
    pub builder: &'static str,
    pub build: BuilderFn,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("family", &self.family)
            .field("variant", &self.variant)
            .field("builder", &self.builder)
            .finish()
    }
}

const fn route(family: ModelFamily, variant: ModelVariant, builder: &'static str, build: BuilderFn) -> Route {
    Route { family, variant, builder, build }
}

static ROUTES: [Route; 9] = [
    route(ModelFamily::Flux, ModelVariant::Dev, "flux_dev", flux_dev::build),
    route(ModelFamily::Flux, ModelVariant::Krea, "flux_dev", flux_dev::build),
    route(ModelFamily::Flux, ModelVariant::Schnell, "flux_schnell", flux_schnell::build),
    route(ModelFamily::Flux, ModelVariant::Kontext, "flux_kontext", flux_kontext::build),
    route(ModelFamily::Sd3, ModelVariant::Sd35, "sd35", sd35::build),
    route(ModelFamily::Sd3, ModelVariant::Sd35Inclclip, "simple_sd", simple_sd::build),
    route(ModelFamily::Sdxl, ModelVariant::Sdxl, "simple_sd", simple_sd::build),
    route(ModelFamily::Sdxl, ModelVariant::CustomSd, "simple_sd", simple_sd::build),
    route(ModelFamily::Sd1, ModelVariant::Sd15, "simple_sd", simple_sd::build),
];

/// Static builder dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowRouter;

impl WorkflowRouter {
    /// The full routing table.
    pub fn routes() -> &'static [Route] {
        &ROUTES
    }

    /// Finds the route for a resolved model.
    ///
    /// # Errors
    /// `ROUTING_FAILED` when the entry has no variant, `NO_BUILDER_FOUND`
    /// when no route matches. Both carry `family` and `variant` in details.
    pub fn lookup(resolved: &ResolvedModel) -> Result<&'static Route> {
        let family = resolved.entry.model_family;
        let Some(variant) = resolved.entry.variant else {
            return Err(UtilsError::new(
                UtilsReason::RoutingFailed,
                format!("Cannot route {}: model has no variant", resolved.matched_filename),
            )
            .with_detail("family", family.as_str())
            .with_detail("variant", json!(null))
            .with_detail("model", resolved.matched_filename.as_str())
            .into());
        };

        let route = ROUTES.iter().find(|r| r.family == family && r.variant == variant).ok_or_else(|| {
            UtilsError::new(
                UtilsReason::NoBuilderFound,
                format!("No supported workflow for {} {} models", family, variant),
            )
            .with_detail("family", family.as_str())
            .with_detail("variant", variant.as_str())
            .with_detail("model", resolved.matched_filename.as_str())
        })?;

        debug!(model = %resolved.matched_filename, builder = route.builder, "Routed model");
        Ok(route)
    }

    /// Returns the builder for a resolved model.
    pub fn route(resolved: &ResolvedModel) -> Result<BuilderFn> {
        Self::lookup(resolved).map(|r| r.build)
    }

    /// Registered filenames that have a builder, sorted.
    pub fn exactly_supported_models() -> Vec<&'static str> {
        ModelRegistry::global()
            .iter()
            .filter(|(_, entry)| {
                entry
                    .variant
                    .is_some_and(|v| ROUTES.iter().any(|r| r.family == entry.model_family && r.variant == v))
            })
            .map(|(name, _)| name)
            .collect()
    }

    /// FLUX variants with a builder.
    pub fn supported_flux_variants() -> Vec<ModelVariant> {
        ROUTES.iter().filter(|r| r.family == ModelFamily::Flux).map(|r| r.variant).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MatchMode, Precision, RegistryEntry};

    fn resolved(family: ModelFamily, variant: Option<ModelVariant>) -> ResolvedModel {
        ResolvedModel {
            requested_identifier: "model.safetensors".to_string(),
            matched_filename: "model.safetensors".to_string(),
            entry: RegistryEntry {
                model_family: family,
                variant,
                priority: 1,
                recommended_precision: Some(Precision::Default),
            },
            match_mode: MatchMode::Exact,
        }
    }

    #[test]
    fn test_routes_every_registered_variant() {
        for (name, entry) in ModelRegistry::global().iter() {
            let model = ResolvedModel {
                requested_identifier: name.to_string(),
                matched_filename: name.to_string(),
                entry: *entry,
                match_mode: MatchMode::Exact,
            };
            assert!(WorkflowRouter::lookup(&model).is_ok(), "{} has no route", name);
        }
    }

    #[test]
    fn test_krea_shares_dev_builder() {
        let krea = WorkflowRouter::lookup(&resolved(ModelFamily::Flux, Some(ModelVariant::Krea))).unwrap();
        assert_eq!(krea.builder, "flux_dev");
        let custom = WorkflowRouter::lookup(&resolved(ModelFamily::Sdxl, Some(ModelVariant::CustomSd))).unwrap();
        assert_eq!(custom.builder, "simple_sd");
    }

    #[test]
    fn test_missing_variant_fails_routing() {
        let err = WorkflowRouter::route(&resolved(ModelFamily::Flux, None)).unwrap_err();
        assert_eq!(err.reason_code(), "ROUTING_FAILED");
        assert_eq!(err.layer().as_str(), "Utils");
        assert_eq!(err.detail("family"), Some(&json!("FLUX")));
        assert_eq!(err.detail("variant"), Some(&json!(null)));
    }

    #[test]
    fn test_unrouted_pair_fails() {
        let err = WorkflowRouter::route(&resolved(ModelFamily::Flux, Some(ModelVariant::Sd15))).unwrap_err();
        assert_eq!(err.reason_code(), "NO_BUILDER_FOUND");
        assert_eq!(err.detail("family"), Some(&json!("FLUX")));
        assert_eq!(err.detail("variant"), Some(&json!("sd15")));
    }

    #[test]
    fn test_introspection() {
        assert_eq!(
            WorkflowRouter::supported_flux_variants(),
            vec![ModelVariant::Dev, ModelVariant::Krea, ModelVariant::Schnell, ModelVariant::Kontext]
        );

        let supported = WorkflowRouter::exactly_supported_models();
        assert_eq!(supported.len(), ModelRegistry::global().len());
        assert!(supported.contains(&"flux1-schnell.safetensors"));
        assert!(supported.windows(2).all(|w| w[0] <= w[1]));
    }
}
