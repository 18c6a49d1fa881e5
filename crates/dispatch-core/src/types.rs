//! Core types for the dispatch engine
//!
//! Defines the request lifecycle values:
//! - Task requests (raw text)
//! - Parsed intents (classifier candidates, un-validated)
//! - Resolved intents (sandboxed, ready to execute)
//! - Execution results (terminal report)

use crate::error::{ErrorKind, TaskError};
use chrono::{DateTime, Utc};
use dispatch_sandbox::SandboxedPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Named raw parameter values (weekday, category, ...)
pub type Parameters = BTreeMap<String, String>;

/// Closed set of operations the engine can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationId {
    /// Fetch and run a data-generation script
    InstallAndRun,
    /// Format a markdown file in place
    FormatMarkdown,
    /// Count dates falling on one weekday
    CountWeekday,
    /// Sort contact records by last then first name
    SortContacts,
    /// First lines of the newest log files
    RecentLogs,
    /// Map documents to their first top-level heading
    MarkdownIndex,
    /// Sender address from an email message
    ExtractEmail,
    /// Card number from an image
    ExtractCard,
    /// Most similar pair of comments
    SimilarComments,
    /// Sum of quantity × price for one category
    SumByCategory,
}

impl OperationId {
    /// Every operation, in classifier priority order
    pub const ALL: [OperationId; 10] = [
        Self::InstallAndRun,
        Self::FormatMarkdown,
        Self::CountWeekday,
        Self::SortContacts,
        Self::RecentLogs,
        Self::MarkdownIndex,
        Self::ExtractEmail,
        Self::ExtractCard,
        Self::SimilarComments,
        Self::SumByCategory,
    ];

    /// Stable kebab-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstallAndRun => "install-and-run",
            Self::FormatMarkdown => "format-markdown",
            Self::CountWeekday => "count-weekday",
            Self::SortContacts => "sort-contacts",
            Self::RecentLogs => "recent-logs",
            Self::MarkdownIndex => "markdown-index",
            Self::ExtractEmail => "extract-email",
            Self::ExtractCard => "extract-card",
            Self::SimilarComments => "similar-comments",
            Self::SumByCategory => "sum-by-category",
        }
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| TaskError::ClassificationAmbiguous(format!("unknown operation '{s}'")))
    }
}

/// Which classifier produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    /// Rule-based matcher
    #[default]
    Rules,
    /// Language-model fallback
    Model,
    /// Field-level merge of both
    Merged,
}

/// Raw task text as received
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Request identifier (for log correlation)
    pub id: Uuid,
    /// Free-text task description
    pub text: String,
    /// Arrival time
    pub received_at: DateTime<Utc>,
}

impl TaskRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Classifier candidate: every field may still be unset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedIntent {
    /// Operation, if recognized
    pub operation: Option<OperationId>,
    /// Input path (un-validated)
    pub input: Option<String>,
    /// Output path (un-validated)
    pub output: Option<String>,
    /// Extracted parameters
    pub parameters: Parameters,
    /// Producing classifier
    pub source: IntentSource,
}

impl ParsedIntent {
    /// Create candidate for an operation
    #[inline]
    #[must_use]
    pub fn new(operation: OperationId, source: IntentSource) -> Self {
        Self {
            operation: Some(operation),
            source,
            ..Self::default()
        }
    }

    /// With input path
    #[inline]
    #[must_use]
    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.input = Some(path.into());
        self
    }

    /// With output path
    #[inline]
    #[must_use]
    pub fn with_output(mut self, path: impl Into<String>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// With parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Check if nothing at all was recognized
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operation.is_none()
            && self.input.is_none()
            && self.output.is_none()
            && self.parameters.is_empty()
    }

    /// Field-level merge: keep every field this candidate set, fill the rest
    /// from `fallback`
    ///
    /// Parameters merge by name with the same precedence.
    #[must_use]
    pub fn merge(self, fallback: Option<ParsedIntent>) -> ParsedIntent {
        let Some(fallback) = fallback else {
            return self;
        };
        if self.is_empty() {
            return fallback;
        }

        let mut parameters = self.parameters;
        for (name, value) in fallback.parameters {
            parameters.entry(name).or_insert(value);
        }

        ParsedIntent {
            operation: self.operation.or(fallback.operation),
            input: self.input.or(fallback.input),
            output: self.output.or(fallback.output),
            parameters,
            source: IntentSource::Merged,
        }
    }
}

/// Sandboxed, complete intent ready for execution
///
/// Every path lies within the data root; required fields for the operation
/// are present. Only the resolver constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIntent {
    operation: OperationId,
    input: Option<SandboxedPath>,
    output: Option<SandboxedPath>,
    parameters: Parameters,
    source: IntentSource,
}

impl ResolvedIntent {
    pub(crate) fn new(
        operation: OperationId,
        input: Option<SandboxedPath>,
        output: Option<SandboxedPath>,
        parameters: Parameters,
        source: IntentSource,
    ) -> Self {
        Self {
            operation,
            input,
            output,
            parameters,
            source,
        }
    }

    /// Resolved operation
    #[inline]
    #[must_use]
    pub fn operation(&self) -> OperationId {
        self.operation
    }

    /// Sandboxed input path, if the operation takes one
    #[inline]
    #[must_use]
    pub fn input_path(&self) -> Option<&SandboxedPath> {
        self.input.as_ref()
    }

    /// Sandboxed output path, if the operation takes one
    #[inline]
    #[must_use]
    pub fn output_path(&self) -> Option<&SandboxedPath> {
        self.output.as_ref()
    }

    /// Classifier that produced the winning candidate
    #[inline]
    #[must_use]
    pub fn source(&self) -> IntentSource {
        self.source
    }

    /// All parameters
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Input path, failing if the operation was resolved without one
    ///
    /// # Errors
    /// Returns `Execution` when the catalog and handler disagree.
    pub fn input(&self) -> Result<&SandboxedPath, TaskError> {
        self.input
            .as_ref()
            .ok_or_else(|| TaskError::Execution(format!("{} resolved without input", self.operation)))
    }

    /// Output path, failing if the operation was resolved without one
    ///
    /// # Errors
    /// Returns `Execution` when the catalog and handler disagree.
    pub fn output(&self) -> Result<&SandboxedPath, TaskError> {
        self.output
            .as_ref()
            .ok_or_else(|| TaskError::Execution(format!("{} resolved without output", self.operation)))
    }

    /// Required parameter value
    ///
    /// # Errors
    /// Returns `Execution` when the catalog and handler disagree.
    pub fn parameter(&self, name: &str) -> Result<&str, TaskError> {
        self.parameters
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TaskError::Execution(format!("{} resolved without '{name}'", self.operation)))
    }

    /// JSON view for previews and logs
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "operation": self.operation,
            "input": self.input.as_ref().map(|p| p.as_path().display().to_string()),
            "output": self.output.as_ref().map(|p| p.as_path().display().to_string()),
            "parameters": self.parameters,
            "source": self.source,
        })
    }
}

/// Terminal status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Artifact written / action performed
    Success,
    /// Request failed; see `error_kind`
    Failure,
}

/// Structured result returned for every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Success or failure
    pub status: ExecutionStatus,
    /// Human-readable summary or error message
    pub message: String,
    /// Written artifact, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// Resolved operation, if resolution got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
    /// Failure kind (failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionResult {
    /// Create success result
    #[inline]
    #[must_use]
    pub fn success(
        operation: OperationId,
        message: impl Into<String>,
        artifact_path: Option<PathBuf>,
    ) -> Self {
        Self {
            status: ExecutionStatus::Success,
            message: message.into(),
            artifact_path,
            operation: Some(operation),
            error_kind: None,
        }
    }

    /// Create failure result from an error
    #[must_use]
    pub fn failure(operation: Option<OperationId>, error: &TaskError) -> Self {
        Self {
            status: ExecutionStatus::Failure,
            message: error.to_string(),
            artifact_path: None,
            operation,
            error_kind: Some(error.kind()),
        }
    }

    /// Check if the request succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operation_id_round_trips_names() {
        for op in OperationId::ALL {
            assert_eq!(op.as_str().parse::<OperationId>().unwrap(), op);
        }
    }

    #[test]
    fn operation_id_accepts_snake_case() {
        assert_eq!(
            "count_weekday".parse::<OperationId>().unwrap(),
            OperationId::CountWeekday
        );
        assert_eq!(
            " Sum-By-Category ".parse::<OperationId>().unwrap(),
            OperationId::SumByCategory
        );
    }

    #[test]
    fn operation_id_rejects_unknown() {
        let err = "translate-poem".parse::<OperationId>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationAmbiguous);
    }

    #[test]
    fn operation_id_serializes_kebab() {
        let json = serde_json::to_string(&OperationId::RecentLogs).unwrap();
        assert_eq!(json, "\"recent-logs\"");
    }

    #[test]
    fn merge_prefers_primary_field_by_field() {
        let rules = ParsedIntent::new(OperationId::CountWeekday, IntentSource::Rules)
            .with_input("/data/dates.txt")
            .with_parameter("weekday", "Wednesday");
        let model = ParsedIntent::new(OperationId::SortContacts, IntentSource::Model)
            .with_input("/data/other.txt")
            .with_output("/data/count.txt")
            .with_parameter("weekday", "Monday")
            .with_parameter("extra", "x");

        let merged = rules.merge(Some(model));

        assert_eq!(merged.operation, Some(OperationId::CountWeekday));
        assert_eq!(merged.input.as_deref(), Some("/data/dates.txt"));
        assert_eq!(merged.output.as_deref(), Some("/data/count.txt"));
        assert_eq!(merged.parameters["weekday"], "Wednesday");
        assert_eq!(merged.parameters["extra"], "x");
        assert_eq!(merged.source, IntentSource::Merged);
    }

    #[test]
    fn merge_without_fallback_is_identity() {
        let rules = ParsedIntent::new(OperationId::RecentLogs, IntentSource::Rules);
        assert_eq!(rules.clone().merge(None), rules);
    }

    #[test]
    fn merge_empty_primary_takes_fallback() {
        let model = ParsedIntent::new(OperationId::RecentLogs, IntentSource::Model);
        let merged = ParsedIntent::default().merge(Some(model.clone()));
        assert_eq!(merged, model);
    }

    #[test]
    fn failure_result_carries_kind() {
        let err = TaskError::InsufficientInput("need 2 comments".into());
        let result = ExecutionResult::failure(Some(OperationId::SimilarComments), &err);
        assert!(!result.is_success());
        assert_eq!(result.error_kind, Some(ErrorKind::InsufficientInput));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_kind"], "InsufficientInput");
        assert!(json.get("artifact_path").is_none());
    }

    #[test]
    fn success_result_json_shape() {
        let result = ExecutionResult::success(
            OperationId::CountWeekday,
            "counted 2",
            Some(PathBuf::from("/srv/data/count.txt")),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["operation"], "count-weekday");
        assert_eq!(json["artifact_path"], "/srv/data/count.txt");
        assert!(json.get("error_kind").is_none());
    }
}
