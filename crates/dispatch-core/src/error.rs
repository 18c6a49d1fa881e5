//! Error types for the dispatch engine
//!
//! Every failure a request can hit maps onto one closed [`ErrorKind`]:
//! - Classification failures (no operation, missing parameter)
//! - Sandbox failures (escape, missing input)
//! - Handler failures (malformed input, precondition, collaborator, other)

use crate::types::OperationId;
use dispatch_collab::CollaboratorError;
use dispatch_sandbox::SandboxError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Closed failure taxonomy reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No operation resolvable from the task text
    ClassificationAmbiguous,
    /// Operation known, a required field is missing
    ClassificationIncomplete,
    /// Resolved path leaves the data root
    PathEscape,
    /// Required file or record absent
    InputNotFound,
    /// Malformed date, JSON or other structured input
    ParseError,
    /// Operation-specific precondition not met
    InsufficientInput,
    /// Collaborator unreachable, timed out or answered unparseably
    ExternalServiceError,
    /// Any other handler-internal failure
    ExecutionError,
}

impl ErrorKind {
    /// Check if this kind aborts before any handler runs
    #[inline]
    #[must_use]
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::ClassificationAmbiguous
                | Self::ClassificationIncomplete
                | Self::PathEscape
                | Self::InputNotFound
        )
    }
}

/// Main task error type
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No operation could be resolved
    #[error("classification ambiguous: {0}")]
    ClassificationAmbiguous(String),

    /// Operation resolved but required fields are missing
    #[error("classification incomplete for {operation}: missing {}", .missing.join(", "))]
    ClassificationIncomplete {
        operation: OperationId,
        missing: Vec<String>,
    },

    /// Path leaves the data root
    #[error("path '{path}' escapes data root {}", .root.display())]
    PathEscape { path: String, root: PathBuf },

    /// Input file, directory or record absent
    #[error("input not found: {0}")]
    InputNotFound(String),

    /// Structured input could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Operation precondition not met
    #[error("insufficient input: {0}")]
    InsufficientInput(String),

    /// Collaborator failure
    #[error("external service error: {0}")]
    ExternalService(CollaboratorError),

    /// IO error while reading or writing task files
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other handler failure
    #[error("execution failed: {0}")]
    Execution(String),
}

impl TaskError {
    /// Taxonomy kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClassificationAmbiguous(_) => ErrorKind::ClassificationAmbiguous,
            Self::ClassificationIncomplete { .. } => ErrorKind::ClassificationIncomplete,
            Self::PathEscape { .. } => ErrorKind::PathEscape,
            Self::InputNotFound(_) => ErrorKind::InputNotFound,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::InsufficientInput(_) => ErrorKind::InsufficientInput,
            Self::ExternalService(_) => ErrorKind::ExternalServiceError,
            Self::Io { .. } | Self::Execution(_) => ErrorKind::ExecutionError,
        }
    }

    /// Check if a caller may retry the same request
    ///
    /// The engine itself never retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create malformed-collaborator-response error
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::ExternalService(CollaboratorError::malformed(message))
    }
}

impl From<SandboxError> for TaskError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::PathEscape { path, root } => Self::PathEscape { path, root },
            SandboxError::NotFound(path) => Self::InputNotFound(path.display().to_string()),
            other => Self::Execution(other.to_string()),
        }
    }
}

impl From<CollaboratorError> for TaskError {
    fn from(err: CollaboratorError) -> Self {
        if err.is_service_failure() {
            Self::ExternalService(err)
        } else {
            Self::Execution(err.to_string())
        }
    }
}

/// Configuration errors raised at engine construction
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value failed validation
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Data root unusable
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// Collaborator client could not be built
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl ConfigError {
    /// Create validation error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_display() {
        let err = TaskError::ClassificationIncomplete {
            operation: OperationId::CountWeekday,
            missing: vec!["weekday".to_string(), "output".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "classification incomplete for count-weekday: missing weekday, output"
        );
    }

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            TaskError::ClassificationAmbiguous("x".into()).kind(),
            ErrorKind::ClassificationAmbiguous
        );
        assert_eq!(TaskError::Parse("x".into()).kind(), ErrorKind::ParseError);
        assert_eq!(
            TaskError::InsufficientInput("x".into()).kind(),
            ErrorKind::InsufficientInput
        );
        assert_eq!(
            TaskError::Execution("x".into()).kind(),
            ErrorKind::ExecutionError
        );
    }

    #[test]
    fn sandbox_errors_convert() {
        let escape: TaskError = SandboxError::escape("../x", "/srv").into();
        assert_eq!(escape.kind(), ErrorKind::PathEscape);

        let missing: TaskError = SandboxError::NotFound(PathBuf::from("/srv/x")).into();
        assert_eq!(missing.kind(), ErrorKind::InputNotFound);
    }

    #[test]
    fn collaborator_errors_convert() {
        let timeout: TaskError = CollaboratorError::Timeout { duration_secs: 5 }.into();
        assert_eq!(timeout.kind(), ErrorKind::ExternalServiceError);
        assert!(timeout.is_retryable());

        let exit: TaskError = CollaboratorError::UnexpectedExit {
            program: "npx".into(),
            expected: 0,
            actual: Some(1),
            stderr: String::new(),
        }
        .into();
        assert_eq!(exit.kind(), ErrorKind::ExecutionError);
        assert!(!exit.is_retryable());
    }

    #[test]
    fn pre_execution_kinds() {
        assert!(ErrorKind::PathEscape.is_pre_execution());
        assert!(ErrorKind::ClassificationAmbiguous.is_pre_execution());
        assert!(!ErrorKind::ParseError.is_pre_execution());
        assert!(!ErrorKind::ExternalServiceError.is_pre_execution());
    }

    #[test]
    fn error_kind_serializes_by_name() {
        let json = serde_json::to_string(&ErrorKind::ExternalServiceError).unwrap();
        assert_eq!(json, "\"ExternalServiceError\"");
    }
}
