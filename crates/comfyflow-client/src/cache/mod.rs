//! Inventory caching.
//!
//! Backend file lists change only when models are installed, so a session may
//! opt into memoizing them for a fixed TTL. Invalidation is explicit.

pub mod cache;
pub mod config;
pub mod types;

pub use cache::CachedInventory;
pub use config::CacheConfig;
pub use types::{CacheStats, CachedListing};
