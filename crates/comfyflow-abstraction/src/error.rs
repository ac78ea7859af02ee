//! Layered error taxonomy.
//!
//! Every failure raised by the engine belongs to exactly one layer and carries a
//! reason code from that layer's closed set. The five layer errors share a single
//! generic shape, [`LayerError`], and are unified behind [`EngineError`] so that a
//! transport boundary can recognize "any engine error" with [`is_engine_error`]
//! without enumerating the concrete types.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The layer of the engine an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorLayer {
    /// Static configuration and registry data.
    Config,
    /// Detection and routing helpers.
    Utils,
    /// Backend I/O (inventory queries, connection checks).
    Services,
    /// Graph construction.
    Workflow,
    /// Model file resolution against the live inventory.
    ModelResolver,
}

impl ErrorLayer {
    /// Returns the layer name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "Config",
            Self::Utils => "Utils",
            Self::Services => "Services",
            Self::Workflow => "Workflow",
            Self::ModelResolver => "ModelResolver",
        }
    }
}

impl fmt::Display for ErrorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed set of reason codes belonging to one [`ErrorLayer`].
pub trait Reason:
    Copy + fmt::Debug + fmt::Display + PartialEq + Eq + Send + Sync + 'static
{
    /// The layer every reason of this set belongs to.
    const LAYER: ErrorLayer;

    /// The wire code, e.g. `MISSING_ENCODER`.
    fn code(self) -> &'static str;

    /// Every reason of the set, in declaration order.
    fn all() -> &'static [Self];
}

macro_rules! reason_set {
    (
        $(#[$meta:meta])*
        $name:ident => $layer:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant ),+
        }

        impl Reason for $name {
            const LAYER: ErrorLayer = ErrorLayer::$layer;

            fn code(self) -> &'static str {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            fn all() -> &'static [Self] {
                &[$( Self::$variant ),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

reason_set! {
    /// Reasons for configuration and registry failures.
    ConfigReason => Config {
        /// A configuration value is out of range or inconsistent.
        InvalidConfig = "INVALID_CONFIG",
        /// A configuration file or entry does not exist.
        MissingConfig = "MISSING_CONFIG",
        /// A configuration file could not be read or parsed.
        ConfigParseError = "CONFIG_PARSE_ERROR",
        /// Static registry data is inconsistent.
        RegistryError = "REGISTRY_ERROR",
    }
}

reason_set! {
    /// Reasons for detection and routing failures.
    UtilsReason => Utils {
        ConnectionError = "CONNECTION_ERROR",
        /// A model file could not be classified into a family/variant.
        DetectionFailed = "DETECTION_FAILED",
        InvalidApiKey = "INVALID_API_KEY",
        InvalidModelFormat = "INVALID_MODEL_FORMAT",
        ModelNotFound = "MODEL_NOT_FOUND",
        /// No builder is registered for the resolved family/variant.
        NoBuilderFound = "NO_BUILDER_FOUND",
        PermissionDenied = "PERMISSION_DENIED",
        /// The resolved model lacks the data needed to route it.
        RoutingFailed = "ROUTING_FAILED",
        ServiceUnavailable = "SERVICE_UNAVAILABLE",
    }
}

reason_set! {
    /// Reasons for backend I/O failures.
    ServicesReason => Services {
        /// The backend could not be reached.
        ConnectionError = "CONNECTION_ERROR",
        /// The backend answered with a server error or timed out.
        ServiceUnavailable = "SERVICE_UNAVAILABLE",
        /// Client construction arguments are incomplete.
        InvalidArgs = "INVALID_ARGS",
        /// Credentials are missing or were rejected.
        InvalidAuth = "INVALID_AUTH",
        PermissionDenied = "PERMISSION_DENIED",
        /// The backend answered with a payload that could not be decoded.
        InvalidResponse = "INVALID_RESPONSE",
        UploadFailed = "UPLOAD_FAILED",
        /// The caller cancelled the operation.
        RequestCancelled = "REQUEST_CANCELLED",
    }
}

reason_set! {
    /// Reasons for graph construction failures.
    WorkflowReason => Workflow {
        InvalidConfig = "INVALID_CONFIG",
        /// Caller-supplied generation parameters are unusable.
        InvalidParams = "INVALID_PARAMS",
        /// A mandatory structural asset (autoencoder, encoder file) is missing.
        MissingComponent = "MISSING_COMPONENT",
        /// No usable text encoder configuration exists.
        MissingEncoder = "MISSING_ENCODER",
        UnsupportedModel = "UNSUPPORTED_MODEL",
    }
}

reason_set! {
    /// Reasons for model file resolution failures.
    ModelResolverReason => ModelResolver {
        ModelNotFound = "MODEL_NOT_FOUND",
        /// The backend reports no model files at all.
        NoModelsAvailable = "NO_MODELS_AVAILABLE",
        ConnectionError = "CONNECTION_ERROR",
        /// The requested identifier is empty or malformed.
        InvalidModelFormat = "INVALID_MODEL_FORMAT",
        InvalidApiKey = "INVALID_API_KEY",
        PermissionDenied = "PERMISSION_DENIED",
        ServiceUnavailable = "SERVICE_UNAVAILABLE",
    }
}

/// An error raised by one layer of the engine.
///
/// Created at the point of failure and propagated unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerError<R: Reason> {
    /// The reason code.
    pub reason: R,
    /// Human-readable message.
    pub message: String,
    /// Optional structured context (model names, expected files, ...).
    pub details: Option<Map<String, Value>>,
}

impl<R: Reason> LayerError<R> {
    /// Creates a new error without details.
    pub fn new(reason: R, message: impl Into<String>) -> Self {
        Self { reason, message: message.into(), details: None }
    }

    /// Attaches one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.get_or_insert_with(Map::new).insert(key.into(), value.into());
        self
    }

    /// Returns the layer of this error.
    pub const fn layer(&self) -> ErrorLayer {
        R::LAYER
    }

    /// Looks up a detail entry.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}

impl<R: Reason> fmt::Display for LayerError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<R: Reason> std::error::Error for LayerError<R> {}

/// Configuration layer error.
pub type ConfigError = LayerError<ConfigReason>;
/// Utils layer error.
pub type UtilsError = LayerError<UtilsReason>;
/// Services layer error.
pub type ServicesError = LayerError<ServicesReason>;
/// Workflow layer error.
pub type WorkflowError = LayerError<WorkflowReason>;
/// Model resolver layer error.
pub type ModelResolverError = LayerError<ModelResolverReason>;

/// Any error raised by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Configuration layer.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Utils layer.
    #[error(transparent)]
    Utils(#[from] UtilsError),

    /// Services layer.
    #[error(transparent)]
    Services(#[from] ServicesError),

    /// Workflow layer.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Model resolver layer.
    #[error(transparent)]
    ModelResolver(#[from] ModelResolverError),
}

impl EngineError {
    /// Returns the originating layer.
    pub const fn layer(&self) -> ErrorLayer {
        match self {
            Self::Config(_) => ErrorLayer::Config,
            Self::Utils(_) => ErrorLayer::Utils,
            Self::Services(_) => ErrorLayer::Services,
            Self::Workflow(_) => ErrorLayer::Workflow,
            Self::ModelResolver(_) => ErrorLayer::ModelResolver,
        }
    }

    /// Returns the reason code, e.g. `NO_BUILDER_FOUND`.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.reason.code(),
            Self::Utils(e) => e.reason.code(),
            Self::Services(e) => e.reason.code(),
            Self::Workflow(e) => e.reason.code(),
            Self::ModelResolver(e) => e.reason.code(),
        }
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(e) => &e.message,
            Self::Utils(e) => &e.message,
            Self::Services(e) => &e.message,
            Self::Workflow(e) => &e.message,
            Self::ModelResolver(e) => &e.message,
        }
    }

    /// Returns the structured details, if any.
    pub fn details(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Config(e) => e.details.as_ref(),
            Self::Utils(e) => e.details.as_ref(),
            Self::Services(e) => e.details.as_ref(),
            Self::Workflow(e) => e.details.as_ref(),
            Self::ModelResolver(e) => e.details.as_ref(),
        }
    }

    /// Looks up a detail entry.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details().and_then(|d| d.get(key))
    }

    /// Returns true for a Services error with the given reason.
    pub fn is_services(&self, reason: ServicesReason) -> bool {
        matches!(self, Self::Services(e) if e.reason == reason)
    }
}

impl Serialize for EngineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EngineError", 4)?;
        state.serialize_field("layer", &self.layer())?;
        state.serialize_field("reason", self.reason_code())?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("details", &self.details())?;
        state.end()
    }
}

/// Returns true if `err`, or any error in its source chain, was raised by the engine.
///
/// Recognizes both the unified [`EngineError`] and the bare layer errors.
pub fn is_engine_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<EngineError>()
            || e.is::<ConfigError>()
            || e.is::<UtilsError>()
            || e.is::<ServicesError>()
            || e.is::<WorkflowError>()
            || e.is::<ModelResolverError>()
        {
            return true;
        }
        current = e.source();
    }
    false
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
