//! Backend authentication.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use comfyflow_abstraction::{Result, ServicesError, ServicesReason};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How requests to the backend are authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// Bearer token.
    Bearer {
        #[serde(default)]
        api_key: Option<String>,
    },
    /// Arbitrary headers added to every request.
    Custom {
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl AuthConfig {
    /// Returns the mode name used in error details.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
            Self::Custom { .. } => "custom",
        }
    }

    /// Checks that the mode has every credential it needs.
    pub fn validate(&self) -> Result<()> {
        let err = |reason: ServicesReason, message: &str| -> Result<()> {
            Err(ServicesError::new(reason, message).with_detail("authType", self.kind()).into())
        };

        match self {
            Self::None => Ok(()),
            Self::Basic { username, password } => {
                if is_blank(username.as_deref()) || is_blank(password.as_deref()) {
                    return err(
                        ServicesReason::InvalidArgs,
                        "Basic authentication requires username and password",
                    );
                }
                Ok(())
            }
            Self::Bearer { api_key } => {
                if is_blank(api_key.as_deref()) {
                    return err(
                        ServicesReason::InvalidAuth,
                        "Bearer token authentication requires API key",
                    );
                }
                Ok(())
            }
            Self::Custom { headers } => {
                if headers.is_empty() {
                    return err(
                        ServicesReason::InvalidArgs,
                        "Custom authentication requires custom headers",
                    );
                }
                Ok(())
            }
        }
    }

    /// Builds the headers sent with every request.
    pub fn headers(&self) -> Result<HeaderMap> {
        self.validate()?;

        let mut headers = HeaderMap::new();
        match self {
            Self::None => {}
            Self::Basic { username, password } => {
                let raw = format!(
                    "{}:{}",
                    username.as_deref().unwrap_or_default(),
                    password.as_deref().unwrap_or_default()
                );
                let value = format!("Basic {}", STANDARD.encode(raw));
                headers.insert(AUTHORIZATION, header_value(&value)?);
            }
            Self::Bearer { api_key } => {
                let value = format!("Bearer {}", api_key.as_deref().unwrap_or_default());
                headers.insert(AUTHORIZATION, header_value(&value)?);
            }
            Self::Custom { headers: custom } => {
                for (name, value) in custom {
                    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                        ServicesError::new(
                            ServicesReason::InvalidArgs,
                            format!("Invalid header name '{}': {}", name, e),
                        )
                    })?;
                    headers.insert(name, header_value(value)?);
                }
            }
        }
        Ok(headers)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|e| {
        ServicesError::new(ServicesReason::InvalidArgs, format!("Invalid header value: {}", e))
    })?;
    header.set_sensitive(true);
    Ok(header)
}
