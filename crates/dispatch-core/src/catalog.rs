//! Operation catalog
//!
//! Provides [`OperationCatalog`], the read-only registry mapping each
//! [`OperationId`] to its descriptor and handler. Built once at engine start;
//! adding an operation means registering one descriptor.

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::ops;
use crate::types::{OperationId, ParsedIntent, ResolvedIntent};
use dispatch_collab::{CollaboratorError, CompletionClient, EmbeddingClient, ProcessRunner};
use dispatch_sandbox::{PathSandbox, SandboxedPath};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether an operation takes a path in a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// Must be present after resolution
    Required,
    /// Ignored if supplied
    Unused,
}

impl PathRole {
    /// Check if the slot must be filled
    #[inline]
    #[must_use]
    pub fn is_required(self) -> bool {
        self == Self::Required
    }
}

/// Shape of an operation's input path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single existing file
    File,
    /// An existing directory
    Directory,
}

/// What a successful handler produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Written or modified artifact
    pub artifact: Option<SandboxedPath>,
    /// Human-readable summary
    pub summary: String,
}

impl Outcome {
    /// Create outcome with an artifact
    #[inline]
    #[must_use]
    pub fn written(artifact: &SandboxedPath, summary: impl Into<String>) -> Self {
        Self {
            artifact: Some(artifact.clone()),
            summary: summary.into(),
        }
    }

    /// Create outcome without an artifact
    #[inline]
    #[must_use]
    pub fn action(summary: impl Into<String>) -> Self {
        Self {
            artifact: None,
            summary: summary.into(),
        }
    }
}

/// Injected external capabilities
#[derive(Clone)]
pub struct Collaborators {
    /// Text completion (classification fallback, extraction)
    pub completion: Option<Arc<dyn CompletionClient>>,
    /// Sentence embeddings (similar comments)
    pub embedding: Option<Arc<dyn EmbeddingClient>>,
    /// Subprocesses (formatter, script runner)
    pub process: Arc<dyn ProcessRunner>,
}

impl Collaborators {
    /// Create bundle with only a process runner
    #[inline]
    #[must_use]
    pub fn new(process: Arc<dyn ProcessRunner>) -> Self {
        Self {
            completion: None,
            embedding: None,
            process,
        }
    }

    /// With completion client
    #[inline]
    #[must_use]
    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    /// With embedding client
    #[inline]
    #[must_use]
    pub fn with_embedding(mut self, client: Arc<dyn EmbeddingClient>) -> Self {
        self.embedding = Some(client);
        self
    }

    /// Completion client, or `ExternalService` if none is configured
    ///
    /// # Errors
    /// Returns `ExternalService(NotConfigured)` when absent.
    pub fn completion(&self) -> Result<&dyn CompletionClient, TaskError> {
        self.completion.as_deref().ok_or_else(|| {
            TaskError::ExternalService(CollaboratorError::NotConfigured(
                "no completion service configured".to_string(),
            ))
        })
    }

    /// Embedding client, or `ExternalService` if none is configured
    ///
    /// # Errors
    /// Returns `ExternalService(NotConfigured)` when absent.
    pub fn embedding(&self) -> Result<&dyn EmbeddingClient, TaskError> {
        self.embedding.as_deref().ok_or_else(|| {
            TaskError::ExternalService(CollaboratorError::NotConfigured(
                "no embedding service configured".to_string(),
            ))
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("completion", &self.completion.is_some())
            .field("embedding", &self.embedding.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a handler may touch
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Sandbox for paths discovered during execution
    pub sandbox: Arc<PathSandbox>,
    /// Engine configuration
    pub config: Arc<EngineConfig>,
    /// External capabilities
    pub collaborators: Collaborators,
}

/// Executes one operation against a resolved intent
#[async_trait::async_trait]
pub trait OperationHandler: Send + Sync {
    /// Run to completion or failure; never leaves background work behind
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError>;
}

/// Static description of one operation
#[derive(Clone)]
pub struct OperationDescriptor {
    /// Operation identifier
    pub id: OperationId,
    /// One-line summary (listing and model prompt)
    pub summary: &'static str,
    /// Input slot role
    pub input: PathRole,
    /// Input shape, when required
    pub input_kind: InputKind,
    /// Output slot role
    pub output: PathRole,
    /// Parameter names that must be present
    pub required_parameters: &'static [&'static str],
    /// Handler
    pub handler: Arc<dyn OperationHandler>,
}

impl OperationDescriptor {
    /// Names of required fields the candidate leaves unset
    ///
    /// Path slots are reported as `input` / `output`.
    #[must_use]
    pub fn missing(&self, candidate: &ParsedIntent) -> Vec<String> {
        let mut missing = Vec::new();
        if self.input.is_required() && candidate.input.is_none() {
            missing.push("input".to_string());
        }
        if self.output.is_required() && candidate.output.is_none() {
            missing.push("output".to_string());
        }
        missing.extend(
            self.required_parameters
                .iter()
                .filter(|name| !candidate.parameters.contains_key(**name))
                .map(|name| (*name).to_string()),
        );
        missing
    }
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("input_kind", &self.input_kind)
            .field("output", &self.output)
            .field("required_parameters", &self.required_parameters)
            .finish_non_exhaustive()
    }
}

/// Registry of operation descriptors keyed by id
#[derive(Debug, Default, Clone)]
pub struct OperationCatalog {
    descriptors: BTreeMap<OperationId, OperationDescriptor>,
}

impl OperationCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create catalog with every built-in operation
    #[must_use]
    pub fn standard() -> Self {
        use InputKind::{Directory, File};
        use PathRole::{Required, Unused};

        let mut catalog = Self::new();
        let mut add = |id: OperationId,
                       summary: &'static str,
                       input: PathRole,
                       input_kind: InputKind,
                       output: PathRole,
                       required_parameters: &'static [&'static str],
                       handler: Arc<dyn OperationHandler>| {
            catalog.register(OperationDescriptor {
                id,
                summary,
                input,
                input_kind,
                output,
                required_parameters,
                handler,
            });
        };

        add(
            OperationId::InstallAndRun,
            "download a data-generation script and run it with an email argument",
            Unused,
            File,
            Unused,
            &["script_url", "email"],
            Arc::new(ops::process::ScriptInstaller),
        );
        add(
            OperationId::FormatMarkdown,
            "format a markdown file in place with the configured formatter",
            Required,
            File,
            Unused,
            &[],
            Arc::new(ops::process::MarkdownFormatter),
        );
        add(
            OperationId::CountWeekday,
            "count the dates in a file that fall on a given weekday",
            Required,
            File,
            Required,
            &["weekday"],
            Arc::new(ops::weekday::WeekdayCounter),
        );
        add(
            OperationId::SortContacts,
            "sort a JSON array of contacts by last_name then first_name",
            Required,
            File,
            Required,
            &[],
            Arc::new(ops::contacts::ContactSorter),
        );
        add(
            OperationId::RecentLogs,
            "write the first line of the most recent log files in a directory",
            Required,
            Directory,
            Required,
            &[],
            Arc::new(ops::logs::RecentLogExcerpt),
        );
        add(
            OperationId::MarkdownIndex,
            "index markdown files under a directory by their first top-level heading",
            Required,
            Directory,
            Required,
            &[],
            Arc::new(ops::docs::HeadingIndexer),
        );
        add(
            OperationId::ExtractEmail,
            "extract the sender's email address from an email message",
            Required,
            File,
            Required,
            &[],
            Arc::new(ops::extract::EmailExtractor),
        );
        add(
            OperationId::ExtractCard,
            "extract the credit card number from an image",
            Required,
            File,
            Required,
            &[],
            Arc::new(ops::extract::CardExtractor),
        );
        add(
            OperationId::SimilarComments,
            "find the most similar pair of comments using embeddings",
            Required,
            File,
            Required,
            &[],
            Arc::new(ops::comments::CommentMatcher),
        );
        add(
            OperationId::SumByCategory,
            "total quantity times price for one category in a sqlite database",
            Required,
            File,
            Required,
            &["category"],
            Arc::new(ops::sales::CategoryTotal),
        );

        catalog
    }

    /// Register a descriptor, replacing any previous one for the same id
    pub fn register(&mut self, descriptor: OperationDescriptor) {
        self.descriptors.insert(descriptor.id, descriptor);
    }

    /// Descriptor for an operation
    #[inline]
    #[must_use]
    pub fn get(&self, id: OperationId) -> Option<&OperationDescriptor> {
        self.descriptors.get(&id)
    }

    /// Check if operation is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.descriptors.contains_key(&id)
    }

    /// Descriptors in id order
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.descriptors.values()
    }

    /// Get number of registered operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntentSource;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_catalog_covers_every_operation() {
        let catalog = OperationCatalog::standard();
        assert_eq!(catalog.len(), OperationId::ALL.len());
        for op in OperationId::ALL {
            assert!(catalog.contains(op), "{op} missing");
        }
    }

    #[test]
    fn missing_reports_paths_and_parameters() {
        let catalog = OperationCatalog::standard();
        let descriptor = catalog.get(OperationId::CountWeekday).unwrap();

        let candidate = ParsedIntent::new(OperationId::CountWeekday, IntentSource::Rules)
            .with_input("/data/dates.txt");
        assert_eq!(descriptor.missing(&candidate), vec!["output", "weekday"]);

        let complete = candidate
            .with_output("/data/count.txt")
            .with_parameter("weekday", "Wednesday");
        assert!(descriptor.missing(&complete).is_empty());
    }

    #[test]
    fn unused_slots_are_never_missing() {
        let catalog = OperationCatalog::standard();
        let descriptor = catalog.get(OperationId::InstallAndRun).unwrap();
        let candidate = ParsedIntent::new(OperationId::InstallAndRun, IntentSource::Rules)
            .with_parameter("script_url", "https://example.com/datagen.py")
            .with_parameter("email", "user@example.com");
        assert!(descriptor.missing(&candidate).is_empty());
    }

    #[test]
    fn empty_catalog() {
        let catalog = OperationCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.get(OperationId::RecentLogs).is_none());
    }
}
