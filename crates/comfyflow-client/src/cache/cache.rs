//! CachedInventory implementation with TTL expiry.

use async_trait::async_trait;
use comfyflow_abstraction::{Inventory, InventoryCategory, Result};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::types::{CacheStats, CachedListing};

/// Inventory decorator that memoizes file lists per category.
///
/// Failed fetches are never cached. Locks are released before the inner
/// inventory is awaited.
#[derive(Debug)]
pub struct CachedInventory<I> {
    /// The wrapped inventory.
    inner: I,
    /// How long a listing stays valid.
    ttl: Duration,
    /// The cache storage (category -> listing).
    entries: RwLock<HashMap<InventoryCategory, CachedListing>>,
    /// Cache statistics.
    stats: RwLock<CacheStats>,
}

impl<I: Inventory> CachedInventory<I> {
    /// Wraps `inner` using the TTL from `config`.
    ///
    /// # Errors
    /// Returns a `Config` error if the configuration is invalid.
    pub fn new(inner: I, config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_ttl(inner, config.ttl()))
    }

    /// Wraps `inner` with an explicit TTL.
    pub fn with_ttl(inner: I, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Returns the wrapped inventory.
    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Drops the cached listing of one category.
    ///
    /// Returns `true` if an entry was removed.
    pub fn invalidate(&self, category: InventoryCategory) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(&category).is_some();
        if removed {
            debug!(category = %category, "Invalidated cached inventory");
        }
        removed
    }

    /// Drops every cached listing.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let cleared_count = entries.len();
        entries.clear();
        info!(cleared_count, "Cleared inventory cache");
    }

    /// Number of cached categories, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `category` has a fresh listing.
    pub fn is_valid(&self, category: InventoryCategory) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .is_some_and(|entry| entry.is_fresh(self.ttl))
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn get_stats(&self) -> CacheStats {
        let mut stats = self.stats.read().unwrap_or_else(PoisonError::into_inner).clone();
        stats.cache_size = self.len();
        stats
    }

    fn cached(&self, category: InventoryCategory) -> Option<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&category).filter(|e| e.is_fresh(self.ttl)).map(|e| e.files.clone())
    }

    fn record(&self, hit: bool) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        if hit {
            stats.total_hits += 1;
        } else {
            stats.total_misses += 1;
        }
    }
}

#[async_trait]
impl<I: Inventory> Inventory for CachedInventory<I> {
    async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
        if let Some(files) = self.cached(category) {
            self.record(true);
            debug!(category = %category, "Inventory cache hit");
            return Ok(files);
        }

        self.record(false);
        debug!(category = %category, "Inventory cache miss");

        let files = self.inner.list_files(category).await?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(category, CachedListing::new(files.clone()));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comfyflow_abstraction::{ServicesError, ServicesReason};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingInventory {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Inventory for CountingInventory {
        async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServicesError::new(ServicesReason::ConnectionError, "down").into());
            }
            Ok(vec![format!("{}.safetensors", category)])
        }
    }

    fn calls(cache: &CachedInventory<CountingInventory>) -> usize {
        cache.inner().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let cache = CachedInventory::with_ttl(CountingInventory::default(), Duration::from_secs(60));

        let first = cache.list_files(InventoryCategory::Vae).await.unwrap();
        let second = cache.list_files(InventoryCategory::Vae).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls(&cache), 1);

        let stats = cache.get_stats();
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.cache_size, 1);
    }

    #[tokio::test]
    async fn test_categories_cached_separately() {
        let cache = CachedInventory::with_ttl(CountingInventory::default(), Duration::from_secs(60));

        cache.list_files(InventoryCategory::Vae).await.unwrap();
        cache.list_files(InventoryCategory::Checkpoints).await.unwrap();

        assert_eq!(calls(&cache), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = CachedInventory::with_ttl(CountingInventory::default(), Duration::from_secs(10));

        cache.list_files(InventoryCategory::Vae).await.unwrap();
        assert!(cache.is_valid(InventoryCategory::Vae));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!cache.is_valid(InventoryCategory::Vae));

        cache.list_files(InventoryCategory::Vae).await.unwrap();
        assert_eq!(calls(&cache), 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = CachedInventory::with_ttl(CountingInventory::default(), Duration::from_secs(60));

        cache.list_files(InventoryCategory::Vae).await.unwrap();
        cache.list_files(InventoryCategory::Loras).await.unwrap();

        assert!(cache.invalidate(InventoryCategory::Vae));
        assert!(!cache.invalidate(InventoryCategory::Vae));
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());

        cache.list_files(InventoryCategory::Loras).await.unwrap();
        assert_eq!(calls(&cache), 3);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CachedInventory::with_ttl(CountingInventory::default(), Duration::from_secs(60));
        cache.inner().fail.store(true, Ordering::SeqCst);

        let err = cache.list_files(InventoryCategory::Vae).await.unwrap_err();
        assert!(err.is_services(ServicesReason::ConnectionError));
        assert!(cache.is_empty());

        cache.inner().fail.store(false, Ordering::SeqCst);
        assert!(cache.list_files(InventoryCategory::Vae).await.is_ok());
        assert_eq!(calls(&cache), 2);
    }

    #[test]
    fn test_new_rejects_zero_ttl() {
        let config = CacheConfig { enabled: true, ttl_secs: 0 };
        assert!(CachedInventory::new(CountingInventory::default(), &config).is_err());
    }
}
