//! External process capability
//!
//! Formatting and script-installation tools run as subprocesses. The engine
//! only sees this narrow contract so tests can substitute a recorder.

use crate::error::CollaboratorError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// What to run and what counts as success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Exit code that means success
    pub expected_exit_code: i32,
    /// Working directory, if not inherited
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    /// Build a spec from a command prefix (program followed by fixed args)
    ///
    /// Returns `None` when the prefix is empty.
    #[must_use]
    pub fn from_prefix(prefix: &[String]) -> Option<Self> {
        let (program, args) = prefix.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            expected_exit_code: 0,
            working_dir: None,
        })
    }

    /// Append an argument
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Render as a shell-like line for logs
    #[must_use]
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (`None` if killed by a signal)
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Subprocess collaborator
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion; an exit code other than the expected one is an error
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, CollaboratorError>;
}

/// Runs processes with tokio, killing them on timeout
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    timeout: Duration,
}

impl TokioProcessRunner {
    /// Create runner with a per-process timeout
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait::async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, CollaboratorError> {
        tracing::info!(command = %spec.display_line(), "spawning process");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CollaboratorError::Spawn {
                    program: spec.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(CollaboratorError::Timeout {
                    duration_secs: self.timeout.as_secs(),
                })
            }
        };

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.exit_code == Some(spec.expected_exit_code) {
            Ok(result)
        } else {
            Err(CollaboratorError::UnexpectedExit {
                program: spec.program.clone(),
                expected: spec.expected_exit_code,
                actual: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn spec_from_prefix() {
        let spec = ProcessSpec::from_prefix(&prefix(&["npx", "prettier@3.4.2", "--write"]))
            .unwrap()
            .arg("/data/format.md");
        assert_eq!(spec.program, "npx");
        assert_eq!(spec.args, vec!["prettier@3.4.2", "--write", "/data/format.md"]);
        assert_eq!(spec.expected_exit_code, 0);
        assert_eq!(spec.display_line(), "npx prettier@3.4.2 --write /data/format.md");
    }

    #[test]
    fn spec_from_empty_prefix() {
        assert!(ProcessSpec::from_prefix(&[]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_captures_stdout() {
        let runner = TokioProcessRunner::default();
        let spec = ProcessSpec::from_prefix(&prefix(&["sh", "-c", "echo hello"])).unwrap();
        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_rejects_unexpected_exit() {
        let runner = TokioProcessRunner::default();
        let spec = ProcessSpec::from_prefix(&prefix(&["sh", "-c", "echo bad >&2; exit 3"])).unwrap();
        let err = runner.run(&spec).await.unwrap_err();
        match err {
            CollaboratorError::UnexpectedExit { actual, stderr, .. } => {
                assert_eq!(actual, Some(3));
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn runner_reports_missing_program() {
        let runner = TokioProcessRunner::default();
        let spec = ProcessSpec::from_prefix(&prefix(&["definitely-not-a-real-program-xyz"])).unwrap();
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_times_out() {
        let runner = TokioProcessRunner::new(Duration::from_millis(100));
        let spec = ProcessSpec::from_prefix(&prefix(&["sleep", "5"])).unwrap();
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout { .. }));
    }
}
