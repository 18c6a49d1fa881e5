//! Error types for external collaborators

/// Failures talking to an external collaborator
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// Service could not be reached
    #[error("collaborator unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured timeout
    #[error("collaborator timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Service answered with a non-success status
    #[error("collaborator returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response did not match the expected schema
    #[error("malformed collaborator response: {0}")]
    MalformedResponse(String),

    /// Collaborator is not configured for this engine
    #[error("collaborator not configured: {0}")]
    NotConfigured(String),

    /// Process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited with an unexpected code
    #[error("{program} exited with {actual:?} (expected {expected}): {stderr}")]
    UnexpectedExit {
        program: String,
        expected: i32,
        actual: Option<i32>,
        stderr: String,
    },
}

impl CollaboratorError {
    /// Create malformed-response error
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Check if the failure is on the service side (unreachable, slow, bad answer)
    ///
    /// A process that ran and exited badly is a task failure, not a
    /// service failure.
    #[inline]
    #[must_use]
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, Self::UnexpectedExit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = CollaboratorError::Timeout { duration_secs: 30 };
        assert_eq!(err.to_string(), "collaborator timed out after 30s");
        assert!(err.is_service_failure());
    }

    #[test]
    fn unexpected_exit_is_not_service_failure() {
        let err = CollaboratorError::UnexpectedExit {
            program: "npx".to_string(),
            expected: 0,
            actual: Some(2),
            stderr: "boom".to_string(),
        };
        assert!(!err.is_service_failure());
        assert!(err.to_string().contains("npx"));
    }
}
