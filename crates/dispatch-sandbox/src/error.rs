//! Error types for the path sandbox

use std::path::PathBuf;

/// Errors raised while admitting a path into the sandbox
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Canonical path is not a descendant of the data root
    #[error("path '{path}' escapes data root '{root}'")]
    PathEscape {
        /// Path as it was requested
        path: String,
        /// Canonical data root
        root: PathBuf,
    },

    /// Path was admitted but nothing exists there
    #[error("input not found: {0}")]
    NotFound(PathBuf),

    /// Raw path cannot name anything (empty, NUL byte)
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// The data root itself is unusable
    #[error("invalid data root {root}: {reason}")]
    InvalidRoot {
        /// Root as configured
        root: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// IO error while canonicalizing
    #[error("io error resolving {path}: {source}")]
    Io {
        /// Path being resolved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    /// Create escape error for a raw path
    pub fn escape(path: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::PathEscape {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if error is a containment violation
    #[inline]
    #[must_use]
    pub fn is_escape(&self) -> bool {
        matches!(self, Self::PathEscape { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_display_names_path_and_root() {
        let err = SandboxError::escape("../etc/passwd", "/srv/data");
        let text = err.to_string();
        assert!(text.contains("../etc/passwd"));
        assert!(text.contains("/srv/data"));
        assert!(err.is_escape());
    }

    #[test]
    fn not_found_is_not_escape() {
        let err = SandboxError::NotFound(PathBuf::from("/srv/data/x"));
        assert!(!err.is_escape());
    }
}
