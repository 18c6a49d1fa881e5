//! Task engine facade
//!
//! Wires sandbox, catalog, classifiers, resolver and executor together from
//! one [`EngineConfig`]. The catalog is built once here and shared read-only
//! by every request.

use crate::catalog::{Collaborators, HandlerContext, OperationCatalog};
use crate::classifier::{Classifier, DeterministicClassifier, LlmClassifier};
use crate::config::EngineConfig;
use crate::error::{ConfigError, TaskError};
use crate::executor::OperationExecutor;
use crate::ops;
use crate::resolver::IntentResolver;
use crate::state::{RequestLifecycle, RequestState};
use crate::types::{ExecutionResult, ResolvedIntent, TaskRequest};
use dispatch_collab::{OpenAiClient, OpenAiConfig, TokioProcessRunner};
use dispatch_sandbox::PathSandbox;
use std::sync::Arc;
use tracing::Instrument;

/// Classification-and-dispatch engine
#[derive(Debug, Clone)]
pub struct TaskEngine {
    config: Arc<EngineConfig>,
    catalog: Arc<OperationCatalog>,
    sandbox: Arc<PathSandbox>,
    resolver: IntentResolver,
    executor: OperationExecutor,
}

impl TaskEngine {
    /// Create engine with explicit collaborators
    ///
    /// The completion collaborator, when present, also backs the fallback
    /// classifier.
    ///
    /// # Errors
    /// Returns `ConfigError` when the config fails validation or the data
    /// root is unusable.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut sandbox = PathSandbox::new(&config.data_root)?;
        if let Some(prefix) = &config.virtual_root {
            sandbox = sandbox.with_virtual_root(prefix.clone());
        }
        let sandbox = Arc::new(sandbox);
        let catalog = Arc::new(OperationCatalog::standard());
        let config = Arc::new(config);

        let rules: Arc<dyn Classifier> = Arc::new(DeterministicClassifier::new(Arc::clone(&catalog)));
        let fallback = collaborators.completion.as_ref().map(|client| {
            Arc::new(LlmClassifier::new(
                Arc::clone(client),
                Arc::clone(&catalog),
                config.collaborator.completion_model.clone(),
            )) as Arc<dyn Classifier>
        });
        let resolver = IntentResolver::new(rules, fallback, Arc::clone(&catalog), Arc::clone(&sandbox));

        let context = HandlerContext {
            sandbox: Arc::clone(&sandbox),
            config: Arc::clone(&config),
            collaborators,
        };
        let executor = OperationExecutor::new(Arc::clone(&catalog), context);

        tracing::info!(
            root = %sandbox.root().display(),
            operations = catalog.len(),
            "task engine ready"
        );
        Ok(Self {
            config,
            catalog,
            sandbox,
            resolver,
            executor,
        })
    }

    /// Create engine with collaborators built from the config
    ///
    /// An HTTP completion/embedding client is built only when
    /// `collaborator.api_base` is set.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid config or client construction failure.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let runner = Arc::new(TokioProcessRunner::new(config.process.timeout()));
        let mut collaborators = Collaborators::new(runner);

        if let Some(api_base) = &config.collaborator.api_base {
            let mut http = OpenAiConfig::new(api_base.clone()).with_timeout(config.collaborator.timeout());
            if let Some(key) = &config.collaborator.api_key {
                http = http.with_api_key(key.clone());
            }
            let client = Arc::new(OpenAiClient::new(http)?);
            collaborators = collaborators
                .with_completion(client.clone())
                .with_embedding(client);
        } else {
            tracing::warn!("no collaborator api_base configured; model-backed operations will fail");
        }

        Self::new(config, collaborators)
    }

    /// Classify, resolve and execute one task
    ///
    /// Always yields a result; classification and sandbox failures abort
    /// before any handler runs.
    pub async fn run(&self, text: &str) -> ExecutionResult {
        let request = TaskRequest::new(text);
        let span = tracing::info_span!("request", id = %request.id);
        self.run_request(request).instrument(span).await
    }

    async fn run_request(&self, request: TaskRequest) -> ExecutionResult {
        tracing::info!(text = %request.text, "task received");
        let mut lifecycle = RequestLifecycle::new(request.id);

        let intent = match self.resolve_tracked(&request.text, &mut lifecycle).await {
            Ok(intent) => intent,
            Err(err) => {
                lifecycle.fail();
                tracing::warn!(kind = ?err.kind(), error = %err, "task not resolved");
                return ExecutionResult::failure(None, &err);
            }
        };

        if let Err(err) = lifecycle.advance(RequestState::Executing) {
            lifecycle.fail();
            return ExecutionResult::failure(Some(intent.operation()), &err);
        }
        let result = self.executor.execute(&intent).await;
        if result.is_success() {
            lifecycle.complete();
        } else {
            lifecycle.fail();
        }
        result
    }

    async fn resolve_tracked(
        &self,
        text: &str,
        lifecycle: &mut RequestLifecycle,
    ) -> Result<ResolvedIntent, TaskError> {
        let candidate = self.resolver.classify(text).await?;
        lifecycle.advance(RequestState::Classified)?;
        let intent = self.resolver.bind(candidate)?;
        lifecycle.advance(RequestState::Resolved)?;
        Ok(intent)
    }

    /// Resolve without executing
    ///
    /// # Errors
    /// Classification and sandbox errors.
    pub async fn classify(&self, text: &str) -> Result<ResolvedIntent, TaskError> {
        self.resolver.resolve(text).await
    }

    /// Read a file beneath the data root
    ///
    /// # Errors
    /// `PathEscape`, `InputNotFound` (also for directories), or I/O errors.
    pub async fn read_file(&self, raw_path: &str) -> Result<String, TaskError> {
        let path = self.sandbox.resolve_existing(raw_path)?;
        if path.is_dir() {
            return Err(TaskError::InputNotFound(format!(
                "{} is a directory",
                path.relative_display()
            )));
        }
        tracing::debug!(path = %path.relative_display(), "sandboxed read");
        ops::read_text(&path).await
    }

    /// Operation catalog
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    /// Sandbox over the data root
    #[inline]
    #[must_use]
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Effective configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
