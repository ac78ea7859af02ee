//! ComfyUI backend client.
//!
//! This module implements the `Inventory` trait on top of ComfyUI's HTTP API.
//! File lists are read from `/object_info/{NodeClass}`: every loader node
//! advertises the files it can load as the option list of one required input.

use async_trait::async_trait;
use comfyflow_abstraction::{
    EngineError, Inventory, InventoryCategory, Result, ServicesError, ServicesReason,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::auth::AuthConfig;

/// Default ComfyUI server URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a ComfyUI server.
#[derive(Debug, Clone)]
pub struct ComfyUiClient {
    /// The base URL of the server, without a trailing slash.
    base_url: String,
    /// HTTP client carrying the authentication headers.
    client: Client,
}

/// Server information returned by `/system_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

/// Host information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: Option<String>,
    pub python_version: Option<String>,
    pub comfyui_version: Option<String>,
}

/// One compute device of the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub vram_total: Option<u64>,
    pub vram_free: Option<u64>,
}

impl ComfyUiClient {
    /// Creates a client for `base_url` with the default timeout.
    ///
    /// # Errors
    /// Returns a `Services` error if the authentication setup is incomplete.
    pub fn new(base_url: impl Into<String>, auth: &AuthConfig) -> Result<Self> {
        Self::with_timeout(base_url, auth, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    /// Returns a `Services` error if the base URL is empty, the authentication
    /// setup is incomplete, or the HTTP client cannot be created.
    pub fn with_timeout(
        base_url: impl Into<String>,
        auth: &AuthConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServicesError::new(
                ServicesReason::InvalidArgs,
                "ComfyUI base URL must not be empty",
            )
            .into());
        }

        let client = Client::builder()
            .default_headers(auth.headers()?)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServicesError::new(
                    ServicesReason::InvalidArgs,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self { base_url, client })
    }

    /// Returns the server URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probes `/system_stats` to check that the server is reachable and the
    /// credentials are accepted.
    pub async fn validate_connection(&self) -> Result<SystemStats> {
        let body = self.get_json("/system_stats").await?;
        serde_json::from_value(body).map_err(|e| {
            ServicesError::new(
                ServicesReason::InvalidResponse,
                format!("Unexpected /system_stats payload: {}", e),
            )
            .into()
        })
    }

    /// Fetches the raw `/object_info/{node_class}` document.
    pub async fn object_info(&self, node_class: &str) -> Result<Value> {
        self.get_json(&format!("/object_info/{}", node_class)).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "ComfyUI request");

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(error = %e, base_url = %self.base_url, "Failed to reach ComfyUI");
            transport_error(&e, &self.base_url)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, url = %url, "ComfyUI returned error status");
            return Err(status_error(status, &url));
        }

        let text = response.text().await.map_err(|e| transport_error(&e, &self.base_url))?;
        serde_json::from_str(&text).map_err(|e| {
            error!(error = %e, url = %url, "ComfyUI returned invalid JSON");
            ServicesError::new(
                ServicesReason::InvalidResponse,
                format!("Invalid JSON from {}: {}", path, e),
            )
            .into()
        })
    }
}

#[async_trait]
impl Inventory for ComfyUiClient {
    async fn list_files(&self, category: InventoryCategory) -> Result<Vec<String>> {
        let node = category.loader_node();
        let info = self.object_info(node).await?;
        let files = extract_options(&info, node, category.input_name());
        debug!(category = %category, count = files.len(), "Listed backend files");
        Ok(files)
    }
}

/// Extracts the option list of `node.input.required.<input>`.
///
/// Accepts both the legacy `[[..options..], {..}]` shape and the
/// `["COMBO", {"options": [..]}]` shape. Anything else yields an empty list.
pub fn extract_options(info: &Value, node: &str, input: &str) -> Vec<String> {
    let Some(spec) = info
        .get(node)
        .and_then(|n| n.get("input"))
        .and_then(|i| i.get("required"))
        .and_then(|r| r.get(input))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let options = match spec.first() {
        Some(Value::Array(options)) => Some(options),
        Some(Value::String(kind)) if kind == "COMBO" => {
            spec.get(1).and_then(|o| o.get("options")).and_then(Value::as_array)
        }
        _ => None,
    };

    options
        .map(|opts| opts.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn transport_error(e: &reqwest::Error, base_url: &str) -> EngineError {
    if e.is_timeout() {
        ServicesError::new(
            ServicesReason::ServiceUnavailable,
            format!("ComfyUI at {} timed out", base_url),
        )
        .into()
    } else if e.is_connect() {
        ServicesError::new(
            ServicesReason::ConnectionError,
            format!("ComfyUI server not reachable at {}", base_url),
        )
        .into()
    } else {
        ServicesError::new(ServicesReason::ConnectionError, format!("Network error: {}", e)).into()
    }
}

fn status_error(status: StatusCode, url: &str) -> EngineError {
    let reason = match status {
        StatusCode::UNAUTHORIZED => ServicesReason::InvalidAuth,
        StatusCode::FORBIDDEN => ServicesReason::PermissionDenied,
        s if s.is_server_error() => ServicesReason::ServiceUnavailable,
        _ => ServicesReason::ConnectionError,
    };
    ServicesError::new(reason, format!("ComfyUI request failed ({})", status))
        .with_detail("status", status.as_u16())
        .with_detail("url", url)
        .into()
}
