//! recent-logs: first line of the newest log files in a directory

use super::write_text;
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use dispatch_sandbox::SandboxedPath;
use globset::{Glob, GlobMatcher};
use std::cmp::Reverse;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, BufReader};

struct LogFile {
    path: SandboxedPath,
    name: String,
    modified: SystemTime,
}

fn matcher(pattern: &str) -> Result<GlobMatcher, TaskError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| TaskError::Execution(format!("bad log pattern '{pattern}': {e}")))
}

/// First line of a file, without reading past it
///
/// Bytes that are not UTF-8 are replaced rather than rejected.
async fn first_line(path: &SandboxedPath) -> Result<String, TaskError> {
    let file = tokio::fs::File::open(path.as_path())
        .await
        .map_err(|e| TaskError::io_error(path.as_path(), e))?;
    let mut line = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| TaskError::io_error(path.as_path(), e))?;
    Ok(String::from_utf8_lossy(&line).trim().to_string())
}

/// Files directly inside `dir` whose name matches, newest first
///
/// Equal modification times order by file name ascending.
async fn newest_logs(
    dir: &SandboxedPath,
    ctx: &HandlerContext,
    limit: usize,
) -> Result<Vec<LogFile>, TaskError> {
    let matcher = matcher(&ctx.config.patterns.log_glob)?;
    let mut entries = tokio::fs::read_dir(dir.as_path())
        .await
        .map_err(|e| TaskError::io_error(dir.as_path(), e))?;

    let mut logs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| TaskError::io_error(dir.as_path(), e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !matcher.is_match(&name) {
            continue;
        }
        let path = ctx.sandbox.admit(&entry.path())?;
        let metadata = tokio::fs::metadata(path.as_path())
            .await
            .map_err(|e| TaskError::io_error(path.as_path(), e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| TaskError::io_error(path.as_path(), e))?;
        logs.push(LogFile {
            path,
            name,
            modified,
        });
    }

    logs.sort_by(|a, b| {
        Reverse(a.modified)
            .cmp(&Reverse(b.modified))
            .then_with(|| a.name.cmp(&b.name))
    });
    logs.truncate(limit);
    Ok(logs)
}

/// Handler for `recent-logs`
#[derive(Debug, Default, Clone, Copy)]
pub struct RecentLogExcerpt;

#[async_trait::async_trait]
impl OperationHandler for RecentLogExcerpt {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let dir = intent.input()?;
        let output = intent.output()?;
        let logs = newest_logs(dir, ctx, ctx.config.patterns.recent_log_limit).await?;

        let mut excerpt = String::new();
        for log in &logs {
            excerpt.push_str(&first_line(&log.path).await?);
            excerpt.push('\n');
        }
        write_text(output, &excerpt).await?;

        tracing::info!(files = logs.len(), "recent log excerpt written");
        Ok(Outcome::written(
            output,
            format!("first lines of {} log files", logs.len()),
        ))
    }
}
