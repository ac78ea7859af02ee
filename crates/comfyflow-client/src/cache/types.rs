//! Core data types for inventory caching.

use serde::Serialize;
use tokio::time::Instant;

/// A cached file list with its fetch time.
#[derive(Debug, Clone)]
pub struct CachedListing {
    /// The files reported by the backend.
    pub files: Vec<String>,
    /// When the list was fetched.
    pub fetched_at: Instant,
}

impl CachedListing {
    /// Create a new entry stamped with the current time.
    pub fn new(files: Vec<String>) -> Self {
        Self { files, fetched_at: Instant::now() }
    }

    /// Returns true while the entry is younger than `ttl`.
    pub fn is_fresh(&self, ttl: std::time::Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Cache statistics for observability.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits.
    pub total_hits: u64,
    /// Total number of cache misses.
    pub total_misses: u64,
    /// Number of categories currently cached.
    pub cache_size: usize,
}

impl CacheStats {
    /// Hit ratio in `0.0..=1.0`, or 0 if nothing was requested yet.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits + self.total_misses;
        if total == 0 { 0.0 } else { self.total_hits as f64 / total as f64 }
    }
}
