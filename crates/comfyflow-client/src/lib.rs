//! Backend client for comfyflow.
//!
//! This crate provides the live `Inventory` implementation backed by a ComfyUI
//! server, its authentication modes, and an opt-in TTL cache that can wrap any
//! inventory.

pub mod auth;
pub mod cache;
pub mod comfyui;

pub use auth::AuthConfig;
pub use cache::{CacheConfig, CacheStats, CachedInventory};
pub use comfyui::{ComfyUiClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, SystemStats};
