//! Offline inventory and seed sources.

use async_trait::async_trait;
use comfyflow_abstraction::{
    ConfigError, ConfigReason, Inventory, InventoryCategory, Result, SeedGenerator, ServicesError,
    ServicesReason,
};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// An inventory backed by fixed file lists.
///
/// Used when no backend is reachable (e.g. building workflows from a saved
/// listing) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    files: BTreeMap<InventoryCategory, Vec<String>>,
    failure: Option<ServicesReason>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds files to one category.
    pub fn with_files<I, S>(mut self, category: InventoryCategory, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.entry(category).or_default().extend(files.into_iter().map(Into::into));
        self
    }

    /// Makes every listing fail with a `Services` error of `reason`.
    pub fn failing(mut self, reason: ServicesReason) -> Self {
        self.failure = Some(reason);
        self
    }

    /// Parses a listing such as `{"checkpoints": ["a.safetensors"], "vae": []}`.
    ///
    /// # Errors
    /// Returns a `Config` error with reason `CONFIG_PARSE_ERROR` on malformed
    /// input.
    pub fn from_json(json: &str) -> Result<Self> {
        let files: BTreeMap<InventoryCategory, Vec<String>> =
            serde_json::from_str(json).map_err(|e| {
                ConfigError::new(
                    ConfigReason::ConfigParseError,
                    format!("Invalid inventory listing: {}", e),
                )
            })?;
        Ok(Self { files, failure: None })
    }

    /// Reads a JSON listing from disk.
    ///
    /// # Errors
    /// `MISSING_CONFIG` when the file does not exist, `CONFIG_PARSE_ERROR`
    /// when it cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::new(
                ConfigReason::MissingConfig,
                format!("Inventory file not found: {}", path.display()),
            )
            .with_detail("path", path.display().to_string())
            .into());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                ConfigReason::ConfigParseError,
                format!("Failed to read inventory file: {}", e),
            )
            .with_detail("path", path.display().to_string())
        })?;
        Self::from_json(&content)
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
        if let Some(reason) = self.failure {
            return Err(ServicesError::new(reason, "Inventory unavailable")
                .with_detail("category", category.as_str())
                .into());
        }
        Ok(self.files.get(&category).cloned().unwrap_or_default())
    }
}

/// Largest seed handed out by [`RandomSeedGenerator`].
pub const MAX_SEED: u64 = u32::MAX as u64;

/// Draws distinct seeds from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSeedGenerator;

impl SeedGenerator for RandomSeedGenerator {
    fn generate_seeds(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let mut seen = HashSet::with_capacity(count);
        let mut seeds = Vec::with_capacity(count);
        while seeds.len() < count {
            let seed = rng.gen_range(0..=MAX_SEED);
            if seen.insert(seed) {
                seeds.push(seed);
            }
        }
        seeds
    }
}

/// Deterministic seeds `start, start + 1, ...`.
#[derive(Debug, Clone, Copy)]
pub struct FixedSeedGenerator(pub u64);

impl SeedGenerator for FixedSeedGenerator {
    fn generate_seeds(&self, count: usize) -> Vec<u64> {
        (0..count as u64).map(|i| self.0.wrapping_add(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_listing() {
        let inventory = StaticInventory::new()
            .with_files(InventoryCategory::Checkpoints, ["a.safetensors"])
            .with_files(InventoryCategory::Checkpoints, ["b.safetensors"]);

        let files = inventory.list_files(InventoryCategory::Checkpoints).await.unwrap();
        assert_eq!(files, vec!["a.safetensors", "b.safetensors"]);
        assert!(inventory.list_files(InventoryCategory::Vae).await.unwrap().is_empty());
        assert!(inventory.contains(InventoryCategory::Checkpoints, "b.safetensors").await.unwrap());
    }

    #[tokio::test]
    async fn test_from_json() {
        let inventory = StaticInventory::from_json(
            r#"{"diffusion_models": ["flux1-dev.safetensors"], "text_encoders": ["clip_l.safetensors"]}"#,
        )
        .unwrap();
        let models = inventory.list_files(InventoryCategory::DiffusionModels).await.unwrap();
        assert_eq!(models, vec!["flux1-dev.safetensors"]);

        let err = StaticInventory::from_json(r#"{"unknown": []}"#).unwrap_err();
        assert_eq!(err.reason_code(), "CONFIG_PARSE_ERROR");
    }

    #[test]
    fn test_from_missing_file() {
        let err = StaticInventory::from_file(Path::new("/nonexistent/inventory.json")).unwrap_err();
        assert_eq!(err.reason_code(), "MISSING_CONFIG");
    }

    #[tokio::test]
    async fn test_failing_inventory() {
        let inventory = StaticInventory::new().failing(ServicesReason::ConnectionError);
        let err = inventory.list_files(InventoryCategory::Vae).await.unwrap_err();
        assert!(err.is_services(ServicesReason::ConnectionError));
    }

    #[test]
    fn test_random_seeds_distinct() {
        let seeds = RandomSeedGenerator.generate_seeds(64);
        let unique: HashSet<_> = seeds.iter().collect();
        assert_eq!(unique.len(), 64);
        assert!(seeds.iter().all(|s| *s <= MAX_SEED));
    }

    #[test]
    fn test_fixed_seeds() {
        assert_eq!(FixedSeedGenerator(7).generate_seeds(3), vec![7, 8, 9]);
        assert!(FixedSeedGenerator(0).generate_seeds(0).is_empty());
    }
}
