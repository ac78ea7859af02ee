//! Command implementations for the comfyflow CLI.

pub mod build;
pub mod check;
pub mod models;
pub mod resolve;
pub mod supported;
pub mod types;
