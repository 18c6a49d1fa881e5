//! markdown-index: map each document to its first top-level heading

use super::write_text;
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use dispatch_sandbox::{PathSandbox, SandboxedPath};
use globset::Glob;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// Text of the first `# ` heading line, if any
///
/// `##` and deeper do not count; a bare `#` with no text does not count.
pub(crate) fn first_title(text: &str) -> Option<&str> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix('#')?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let title = rest.trim();
        (!title.is_empty()).then_some(title)
    })
}

/// Walk `docs_root` and index every matching file that has a title
fn build_index(
    sandbox: &PathSandbox,
    docs_root: &Path,
    pattern: &str,
) -> Result<BTreeMap<String, String>, TaskError> {
    let matcher = Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| TaskError::Execution(format!("bad document pattern '{pattern}': {e}")))?;

    let mut index = BTreeMap::new();
    for entry in WalkDir::new(docs_root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(docs_root).to_path_buf();
            TaskError::io_error(path, e.into())
        })?;
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }

        let doc = sandbox.admit(entry.path())?;
        let text = std::fs::read_to_string(doc.as_path())
            .map_err(|e| TaskError::io_error(doc.as_path(), e))?;
        let Some(title) = first_title(&text) else {
            tracing::debug!(path = %doc.relative_display(), "no top-level heading, skipped");
            continue;
        };

        let key = entry
            .path()
            .strip_prefix(docs_root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .map_err(|_| TaskError::Execution(format!("{doc} left the walk root")))?;
        index.insert(key, title.to_string());
    }
    Ok(index)
}

/// Handler for `markdown-index`
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingIndexer;

#[async_trait::async_trait]
impl OperationHandler for HeadingIndexer {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let docs_root: SandboxedPath = intent.input()?.clone();
        let output = intent.output()?;

        let sandbox = Arc::clone(&ctx.sandbox);
        let pattern = ctx.config.patterns.document_glob.clone();
        let walk_root = docs_root.as_path().to_path_buf();
        let index = tokio::task::spawn_blocking(move || build_index(&sandbox, &walk_root, &pattern))
            .await
            .map_err(|e| TaskError::Execution(format!("index task failed: {e}")))??;

        let rendered = serde_json::to_string(&index)
            .map_err(|e| TaskError::Execution(format!("cannot serialize index: {e}")))?;
        write_text(output, &rendered).await?;

        tracing::info!(documents = index.len(), root = %docs_root.relative_display(), "markdown index written");
        Ok(Outcome::written(output, format!("indexed {} documents", index.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing;
    use crate::types::OperationId;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn first_title_takes_single_hash_only() {
        assert_eq!(first_title("intro\n## Sub\n# Title\n# Later\n"), Some("Title"));
        assert_eq!(first_title("#NoSpace\n##  Deep\n"), None);
        assert_eq!(first_title("#   Padded title  \n"), Some("Padded title"));
        assert_eq!(first_title("#\n# Real\n"), Some("Real"));
    }

    #[tokio::test]
    async fn index_is_recursive_and_skips_untitled() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("guide/deep")).unwrap();
        fs::write(docs.join("README.md"), "# Project\n\nbody\n").unwrap();
        fs::write(docs.join("guide/install.md"), "intro\n## Steps\n# Install\n").unwrap();
        fs::write(docs.join("guide/deep/notes.md"), "no heading here\n").unwrap();
        fs::write(docs.join("guide/skip.txt"), "# Not markdown\n").unwrap();

        let ctx = testing::plain_context(&dir);
        let intent = testing::intent(
            &ctx,
            OperationId::MarkdownIndex,
            Some("/data/docs"),
            Some("/data/docs/index.json"),
            &[],
        );
        HeadingIndexer.execute(&intent, &ctx).await.unwrap();

        let written = fs::read_to_string(docs.join("index.json")).unwrap();
        let index: BTreeMap<String, String> = serde_json::from_str(&written).unwrap();
        let expected: BTreeMap<String, String> = [
            ("README.md".to_string(), "Project".to_string()),
            ("guide/install.md".to_string(), "Install".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(index, expected);
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        let ctx = testing::plain_context(&dir);
        let intent = testing::intent(
            &ctx,
            OperationId::MarkdownIndex,
            Some("/data/docs"),
            Some("/data/index.json"),
            &[],
        );
        HeadingIndexer.execute(&intent, &ctx).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("index.json")).unwrap(), "{}");
    }
}
