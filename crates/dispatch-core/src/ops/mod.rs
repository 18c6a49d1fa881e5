//! Operation handlers
//!
//! One module per operation family. Handlers receive only sandboxed paths;
//! anything they discover on disk goes back through the sandbox before use.

pub mod comments;
pub mod contacts;
pub mod docs;
pub mod extract;
pub mod logs;
pub mod process;
pub mod sales;
pub mod weekday;

use crate::error::TaskError;
use dispatch_sandbox::SandboxedPath;

/// Read a sandboxed file as UTF-8 text
pub(crate) async fn read_text(path: &SandboxedPath) -> Result<String, TaskError> {
    tokio::fs::read_to_string(path.as_path())
        .await
        .map_err(|e| TaskError::io_error(path.as_path(), e))
}

/// Write text to a sandboxed file, creating parent directories
pub(crate) async fn write_text(path: &SandboxedPath, contents: &str) -> Result<(), TaskError> {
    if let Some(parent) = path.as_path().parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::io_error(parent, e))?;
    }
    tokio::fs::write(path.as_path(), contents)
        .await
        .map_err(|e| TaskError::io_error(path.as_path(), e))?;
    tracing::debug!(path = %path.relative_display(), bytes = contents.len(), "artifact written");
    Ok(())
}

/// Trimmed, non-empty lines
pub(crate) fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixture helpers for handler unit tests

    use crate::catalog::{Collaborators, HandlerContext};
    use crate::config::EngineConfig;
    use crate::types::{IntentSource, OperationId, Parameters, ResolvedIntent};
    use dispatch_collab::{CollaboratorError, ProcessOutput, ProcessRunner, ProcessSpec};
    use dispatch_sandbox::PathSandbox;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Process runner that succeeds without spawning anything
    pub(crate) struct NoopRunner;

    #[async_trait::async_trait]
    impl ProcessRunner for NoopRunner {
        async fn run(&self, _spec: &ProcessSpec) -> Result<ProcessOutput, CollaboratorError> {
            Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    pub(crate) fn context(dir: &TempDir, collaborators: Collaborators) -> HandlerContext {
        let config = EngineConfig::new(dir.path());
        let sandbox = PathSandbox::new(dir.path())
            .unwrap()
            .with_virtual_root("/data");
        HandlerContext {
            sandbox: Arc::new(sandbox),
            config: Arc::new(config),
            collaborators,
        }
    }

    pub(crate) fn plain_context(dir: &TempDir) -> HandlerContext {
        context(dir, Collaborators::new(Arc::new(NoopRunner)))
    }

    pub(crate) fn intent(
        ctx: &HandlerContext,
        operation: OperationId,
        input: Option<&str>,
        output: Option<&str>,
        parameters: &[(&str, &str)],
    ) -> ResolvedIntent {
        let params: Parameters = parameters
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ResolvedIntent::new(
            operation,
            input.map(|p| ctx.sandbox.resolve(p).unwrap()),
            output.map(|p| ctx.sandbox.resolve(p).unwrap()),
            params,
            IntentSource::Rules,
        )
    }
}
