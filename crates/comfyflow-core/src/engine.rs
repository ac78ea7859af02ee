//! The engine facade: resolve a model identifier, then build its workflow.
//!
//! Every operation that touches the inventory is raced against a
//! [`CancellationToken`]. A cancelled or timed-out operation drops its
//! outstanding inventory queries and returns an error; no partial graph is
//! ever produced.

use comfyflow_abstraction::{
    Inventory, ModelResolverError, ModelResolverReason, Result, SeedGenerator, ServicesError,
    ServicesReason,
};
use comfyflow_client::{CachedInventory, ComfyUiClient};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::inventory::RandomSeedGenerator;
use crate::registry::{ModelRegistry, ResolveOptions, ResolvedModel};
use crate::resolver::ModelResolver;
use crate::workflow::{BuildContext, BuiltWorkflow, GenerationParams, WorkflowRouter};

/// Resolves models and builds their workflows against one inventory.
#[derive(Clone)]
pub struct ComfyEngine {
    registry: &'static ModelRegistry,
    resolver: ModelResolver,
    context: BuildContext,
    operation_timeout: Option<Duration>,
}

impl fmt::Debug for ComfyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComfyEngine")
            .field("registry_size", &self.registry.len())
            .field("context", &self.context)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl ComfyEngine {
    pub fn new(inventory: Arc<dyn Inventory>, seeds: Arc<dyn SeedGenerator>) -> Self {
        Self {
            registry: ModelRegistry::global(),
            resolver: ModelResolver::new(Arc::clone(&inventory)),
            context: BuildContext::new(inventory, seeds),
            operation_timeout: None,
        }
    }

    /// Builds an engine backed by a live ComfyUI server.
    ///
    /// The client is wrapped in a [`CachedInventory`] when caching is enabled.
    ///
    /// # Errors
    /// Returns `Config` errors for invalid configuration and `Services` errors
    /// if the client cannot be created.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let client = ComfyUiClient::with_timeout(&config.backend.base_url, &config.backend.auth, config.timeout())?;
        let inventory: Arc<dyn Inventory> = if config.cache.enabled {
            Arc::new(CachedInventory::new(client, &config.cache)?)
        } else {
            Arc::new(client)
        };

        info!(
            base_url = %config.backend.base_url,
            auth = config.backend.auth.kind(),
            cache = config.cache.enabled,
            "Engine configured"
        );
        Ok(Self::new(inventory, Arc::new(RandomSeedGenerator))
            .with_filename_prefix(config.output.filename_prefix.clone())
            .with_operation_timeout(config.timeout()))
    }

    #[must_use]
    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.context = self.context.with_filename_prefix(prefix);
        self
    }

    /// Bounds every inventory-backed operation.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub const fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    pub const fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Resolves `identifier` to a model the backend can load.
    ///
    /// A registered filename (subject to `options`) resolves without touching
    /// the inventory. Anything else goes through live validation: model ids
    /// such as `flux-dev`, installed filenames, and unregistered files whose
    /// type can be detected from the name.
    ///
    /// # Errors
    /// - `ModelResolver/MODEL_NOT_FOUND` when nothing matches, including a live
    ///   match that fails a filter in `options`
    /// - any error of [`ModelResolver::validate_model`]
    /// - `Services/REQUEST_CANCELLED` if `token` fires first
    pub async fn resolve_model(
        &self,
        identifier: &str,
        options: &ResolveOptions,
        token: &CancellationToken,
    ) -> Result<ResolvedModel> {
        if let Some(resolved) = self.registry.resolve(identifier, options) {
            debug!(identifier = %identifier, file = %resolved.matched_filename, "Resolved from registry");
            return Ok(resolved);
        }

        let resolved = self.cancellable(token, self.resolver.validate_model(identifier)).await?;
        if !options.matches(&resolved.entry) {
            return Err(ModelResolverError::new(
                ModelResolverReason::ModelNotFound,
                format!("Model {} does not match the requested filters", resolved.matched_filename),
            )
            .with_detail("modelId", identifier)
            .with_detail("file", resolved.matched_filename.as_str())
            .into());
        }
        Ok(resolved)
    }

    /// Builds the workflow for a resolved model.
    ///
    /// # Errors
    /// Routing errors (`Utils`), builder errors (`Workflow`), inventory errors
    /// unchanged, or `Services/REQUEST_CANCELLED`.
    pub async fn build_workflow(
        &self,
        model: &ResolvedModel,
        params: &GenerationParams,
        token: &CancellationToken,
    ) -> Result<BuiltWorkflow> {
        let route = WorkflowRouter::lookup(model)?;
        let workflow = self
            .cancellable(token, (route.build)(&model.matched_filename, params, &self.context))
            .await?;

        info!(
            model = %model.matched_filename,
            builder = route.builder,
            nodes = workflow.graph().len(),
            "Workflow built"
        );
        Ok(workflow)
    }

    /// Resolves and builds in one call.
    ///
    /// # Errors
    /// Any error of [`Self::resolve_model`] or [`Self::build_workflow`].
    pub async fn generate(
        &self,
        identifier: &str,
        params: &GenerationParams,
        token: &CancellationToken,
    ) -> Result<(ResolvedModel, BuiltWorkflow)> {
        let model = self.resolve_model(identifier, &ResolveOptions::default(), token).await?;
        let workflow = self.build_workflow(&model, params, token).await?;
        Ok((model, workflow))
    }

    async fn cancellable<T, F>(&self, token: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let bounded = async {
            match self.operation_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ServicesError::new(
                        ServicesReason::ServiceUnavailable,
                        format!("Operation timed out after {:?}", limit),
                    )
                    .with_detail("timeoutMs", u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
                    .into()),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Operation cancelled");
                Err(ServicesError::new(ServicesReason::RequestCancelled, "Operation cancelled").into())
            }
            result = bounded => result,
        }
    }
}
