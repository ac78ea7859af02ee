//! Static model registry.
//!
//! An immutable catalog keyed by canonical model filename. Each entry records
//! the model family, the variant that selects a workflow builder, a priority
//! (1 = most preferred, 10 = least) and the recommended weight precision.
//!
//! The registry also implements the pure lookup half of model resolution:
//! [`ModelRegistry::resolve`] never touches the backend.

mod flux;
mod sd;

pub use sd::{CUSTOM_SD_FILENAME, CUSTOM_SD_VAE_FILENAME};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A model lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "FLUX")]
    Flux,
    #[serde(rename = "SD3")]
    Sd3,
    #[serde(rename = "SDXL")]
    Sdxl,
    #[serde(rename = "SD1")]
    Sd1,
}

impl ModelFamily {
    /// Every family, in declaration order.
    pub const ALL: [Self; 4] = [Self::Flux, Self::Sd3, Self::Sdxl, Self::Sd1];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flux => "FLUX",
            Self::Sd3 => "SD3",
            Self::Sdxl => "SDXL",
            Self::Sd1 => "SD1",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown model family: {}", s))
    }
}

/// A sub-configuration within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelVariant {
    #[serde(rename = "dev")]
    Dev,
    #[serde(rename = "schnell")]
    Schnell,
    #[serde(rename = "kontext")]
    Kontext,
    #[serde(rename = "krea")]
    Krea,
    #[serde(rename = "sd35")]
    Sd35,
    /// SD3.5 checkpoints that bundle their own text encoders.
    #[serde(rename = "sd35-inclclip")]
    Sd35Inclclip,
    #[serde(rename = "sdxl")]
    Sdxl,
    /// The user-supplied custom checkpoint.
    #[serde(rename = "custom-sd")]
    CustomSd,
    #[serde(rename = "sd15")]
    Sd15,
}

impl ModelVariant {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Dev,
        Self::Schnell,
        Self::Kontext,
        Self::Krea,
        Self::Sd35,
        Self::Sd35Inclclip,
        Self::Sdxl,
        Self::CustomSd,
        Self::Sd15,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Schnell => "schnell",
            Self::Kontext => "kontext",
            Self::Krea => "krea",
            Self::Sd35 => "sd35",
            Self::Sd35Inclclip => "sd35-inclclip",
            Self::Sdxl => "sdxl",
            Self::CustomSd => "custom-sd",
            Self::Sd15 => "sd15",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Unknown model variant: {}", s))
    }
}

/// Recommended weight precision, passed to the loader as `weight_dtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Default,
    Fp8E4m3fn,
    Fp8E4m3fnFast,
    Fp8E5m2,
}

impl Precision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fp8E4m3fn => "fp8_e4m3fn",
            Self::Fp8E4m3fnFast => "fp8_e4m3fn_fast",
            Self::Fp8E5m2 => "fp8_e5m2",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Default, Self::Fp8E4m3fn, Self::Fp8E4m3fnFast, Self::Fp8E5m2]
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown precision: {}", s))
    }
}

/// Metadata of one known model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub model_family: ModelFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<ModelVariant>,
    /// 1..=10, lower is preferred.
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_precision: Option<Precision>,
}

impl RegistryEntry {
    pub(crate) const fn new(
        model_family: ModelFamily,
        variant: ModelVariant,
        priority: u8,
        recommended_precision: Precision,
    ) -> Self {
        Self {
            model_family,
            variant: Some(variant),
            priority,
            recommended_precision: Some(recommended_precision),
        }
    }
}

/// Conjunctive filters for [`ModelRegistry::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub model_family: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub recommended_precision: Option<Precision>,
}

impl ResolveOptions {
    /// Whether `entry` satisfies every supplied filter.
    pub fn matches(&self, entry: &RegistryEntry) -> bool {
        if let Some(variant) = &self.variant
            && entry.variant.is_none_or(|v| v.as_str() != variant)
        {
            return false;
        }
        if let Some(family) = &self.model_family
            && entry.model_family.as_str() != family
        {
            return false;
        }
        if let Some(priority) = self.priority
            && entry.priority != priority
        {
            return false;
        }
        if let Some(precision) = self.recommended_precision
            && entry.recommended_precision != Some(precision)
        {
            return false;
        }
        true
    }
}

/// How a resolved identifier matched its registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    Exact,
    CaseInsensitive,
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedModel {
    pub requested_identifier: String,
    pub matched_filename: String,
    pub entry: RegistryEntry,
    pub match_mode: MatchMode,
}

/// Frontend model ids and the variant each one stands for.
const MODEL_ID_VARIANTS: &[(&str, ModelVariant)] = &[
    ("flux-dev", ModelVariant::Dev),
    ("flux-schnell", ModelVariant::Schnell),
    ("flux-kontext-dev", ModelVariant::Kontext),
    ("flux-krea-dev", ModelVariant::Krea),
    ("stable-diffusion-35", ModelVariant::Sd35),
    ("stable-diffusion-35-inclclip", ModelVariant::Sd35Inclclip),
    ("stable-diffusion-xl", ModelVariant::Sdxl),
    ("stable-diffusion-custom", ModelVariant::CustomSd),
    ("stable-diffusion-custom-refiner", ModelVariant::CustomSd),
    ("stable-diffusion-15", ModelVariant::Sd15),
];

/// Returns the variant a frontend model id (without `comfyui/` prefix) maps to.
pub fn variant_for_model_id(model_id: &str) -> Option<ModelVariant> {
    MODEL_ID_VARIANTS.iter().find(|(id, _)| *id == model_id).map(|(_, v)| *v)
}

/// Every frontend model id.
pub fn model_ids() -> impl Iterator<Item = &'static str> {
    MODEL_ID_VARIANTS.iter().map(|(id, _)| *id)
}

/// The static model catalog.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

static GLOBAL: Lazy<ModelRegistry> = Lazy::new(ModelRegistry::builtin);

impl ModelRegistry {
    /// Returns the process-wide built-in registry.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Builds the catalog of every known FLUX and Stable Diffusion model.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        flux::register(&mut entries);
        sd::register(&mut entries);
        Self { entries }
    }

    /// Builds a registry from explicit entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, RegistryEntry)>,
        S: Into<String>,
    {
        Self { entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    /// Looks up a filename verbatim.
    pub fn get(&self, filename: &str) -> Option<&RegistryEntry> {
        self.entries.get(filename)
    }

    /// Every registered filename, without duplicates.
    pub fn all_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(filename, entry)` pairs in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Filenames of `variant`, ascending by priority (ties in filename order).
    ///
    /// An unknown variant yields an empty vector.
    pub fn by_variant(&self, variant: &str) -> Vec<&str> {
        let Ok(variant) = variant.parse::<ModelVariant>() else {
            return Vec::new();
        };
        let mut names: Vec<(&str, u8)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.variant == Some(variant))
            .map(|(k, e)| (k.as_str(), e.priority))
            .collect();
        names.sort_by_key(|(_, priority)| *priority);
        names.into_iter().map(|(name, _)| name).collect()
    }

    /// Resolves `identifier` against the catalog.
    ///
    /// Returns `None` when the key is unknown or any supplied filter
    /// mismatches; neither case is an error.
    pub fn resolve(&self, identifier: &str, options: &ResolveOptions) -> Option<ResolvedModel> {
        if identifier.is_empty() {
            return None;
        }

        let (filename, entry, match_mode) = if options.case_insensitive {
            let wanted = identifier.to_lowercase();
            let (key, entry) = self.entries.iter().find(|(k, _)| k.to_lowercase() == wanted)?;
            let mode = if key == identifier { MatchMode::Exact } else { MatchMode::CaseInsensitive };
            (key, entry, mode)
        } else {
            let (key, entry) = self.entries.get_key_value(identifier)?;
            (key, entry, MatchMode::Exact)
        };

        if !options.matches(entry) {
            return None;
        }

        Some(ResolvedModel {
            requested_identifier: identifier.to_string(),
            matched_filename: filename.clone(),
            entry: *entry,
            match_mode,
        })
    }
}
