//! Intent resolution
//!
//! Merges classifier candidates field by field (rules first, model fills the
//! gaps), checks the result against the catalog, and binds every path
//! through the sandbox. Nothing here touches file contents.

use crate::catalog::{InputKind, OperationCatalog, OperationDescriptor};
use crate::classifier::Classifier;
use crate::error::TaskError;
use crate::types::{OperationId, ParsedIntent, ResolvedIntent};
use dispatch_sandbox::{PathSandbox, SandboxedPath};
use std::sync::Arc;

/// Turns task text into a [`ResolvedIntent`]
#[derive(Clone)]
pub struct IntentResolver {
    primary: Arc<dyn Classifier>,
    fallback: Option<Arc<dyn Classifier>>,
    catalog: Arc<OperationCatalog>,
    sandbox: Arc<PathSandbox>,
}

impl IntentResolver {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(
        primary: Arc<dyn Classifier>,
        fallback: Option<Arc<dyn Classifier>>,
        catalog: Arc<OperationCatalog>,
        sandbox: Arc<PathSandbox>,
    ) -> Self {
        Self {
            primary,
            fallback,
            catalog,
            sandbox,
        }
    }

    /// Classify and bind in one step
    ///
    /// # Errors
    /// Classification and sandbox errors, unchanged.
    pub async fn resolve(&self, text: &str) -> Result<ResolvedIntent, TaskError> {
        let candidate = self.classify(text).await?;
        self.bind(candidate)
    }

    /// Merged candidate whose operation is in the catalog and whose
    /// required fields are all present
    ///
    /// The fallback is consulted only when the primary candidate leaves a
    /// required field unset.
    ///
    /// # Errors
    /// - `ClassificationAmbiguous` when no known operation results
    /// - `ClassificationIncomplete` when required fields remain unset
    /// - `ExternalService` when the fallback collaborator fails
    pub async fn classify(&self, text: &str) -> Result<ParsedIntent, TaskError> {
        let primary = self.primary.classify(text).await?.unwrap_or_default();

        let merged = if self.is_complete(&primary) {
            primary
        } else if let Some(fallback) = &self.fallback {
            tracing::debug!(operation = ?primary.operation, "consulting fallback classifier");
            primary.merge(fallback.classify(text).await?)
        } else {
            primary
        };

        let descriptor = self.descriptor_for(&merged)?;
        let missing = descriptor.missing(&merged);
        if !missing.is_empty() {
            return Err(TaskError::ClassificationIncomplete {
                operation: descriptor.id,
                missing,
            });
        }

        tracing::debug!(operation = %descriptor.id, source = ?merged.source, "task classified");
        Ok(merged)
    }

    /// Sandbox every path the operation uses
    ///
    /// Inputs must exist and match the operation's input kind; outputs need
    /// only stay inside the root.
    ///
    /// # Errors
    /// `PathEscape`, `InputNotFound`, or classification errors for a
    /// candidate that skipped [`classify`](Self::classify).
    pub fn bind(&self, candidate: ParsedIntent) -> Result<ResolvedIntent, TaskError> {
        let descriptor = self.descriptor_for(&candidate)?;
        let missing = descriptor.missing(&candidate);
        if !missing.is_empty() {
            return Err(TaskError::ClassificationIncomplete {
                operation: descriptor.id,
                missing,
            });
        }

        let input = match (descriptor.input.is_required(), candidate.input.as_deref()) {
            (true, Some(raw)) => Some(self.bind_input(raw, descriptor.input_kind)?),
            _ => None,
        };
        let output = match (descriptor.output.is_required(), candidate.output.as_deref()) {
            (true, Some(raw)) => Some(self.sandbox.resolve(raw)?),
            _ => None,
        };

        Ok(ResolvedIntent::new(
            descriptor.id,
            input,
            output,
            candidate.parameters,
            candidate.source,
        ))
    }

    fn is_complete(&self, candidate: &ParsedIntent) -> bool {
        candidate
            .operation
            .and_then(|op| self.catalog.get(op))
            .is_some_and(|d| d.missing(candidate).is_empty())
    }

    fn descriptor_for(&self, candidate: &ParsedIntent) -> Result<&OperationDescriptor, TaskError> {
        let operation: OperationId = candidate.operation.ok_or_else(|| {
            TaskError::ClassificationAmbiguous("no operation matches the task".to_string())
        })?;
        self.catalog.get(operation).ok_or_else(|| {
            TaskError::ClassificationAmbiguous(format!("operation {operation} is not available"))
        })
    }

    fn bind_input(&self, raw: &str, kind: InputKind) -> Result<SandboxedPath, TaskError> {
        let path = self.sandbox.resolve_existing(raw)?;
        match (kind, path.is_dir()) {
            (InputKind::File, false) | (InputKind::Directory, true) => Ok(path),
            (InputKind::File, true) => Err(TaskError::InputNotFound(format!(
                "{} is a directory, expected a file",
                path.relative_display()
            ))),
            (InputKind::Directory, false) => Err(TaskError::InputNotFound(format!(
                "{} is not a directory",
                path.relative_display()
            ))),
        }
    }
}

impl std::fmt::Debug for IntentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentResolver")
            .field("has_fallback", &self.fallback.is_some())
            .field("root", &self.sandbox.root())
            .finish_non_exhaustive()
    }
}
