//! install-and-run / format-markdown: operations delegated to external tools

use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use dispatch_collab::ProcessSpec;

fn command(prefix: &[String], field: &str) -> Result<ProcessSpec, TaskError> {
    ProcessSpec::from_prefix(prefix)
        .ok_or_else(|| TaskError::Execution(format!("{field} command is empty")))
}

/// Handler for `install-and-run`
///
/// Runs the configured script runner as
/// `<runner...> <script_url> <email> --root <data_root>` from the data root.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptInstaller;

#[async_trait::async_trait]
impl OperationHandler for ScriptInstaller {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let url = intent.parameter("script_url")?;
        let email = intent.parameter("email")?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(TaskError::Parse(format!("script url '{url}' is not http(s)")));
        }
        if !email.contains('@') {
            return Err(TaskError::Parse(format!("'{email}' is not an email address")));
        }

        let root = ctx.sandbox.root();
        let spec = command(&ctx.config.process.script_runner, "script_runner")?
            .arg(url)
            .arg(email)
            .arg("--root")
            .arg(root.display().to_string())
            .in_dir(root);

        let output = ctx.collaborators.process.run(&spec).await?;
        tracing::info!(script = %url, "data generation script finished");
        tracing::debug!(stdout = %output.stdout.trim(), "script output");
        Ok(Outcome::action(format!("ran {url} for {email}")))
    }
}

/// Handler for `format-markdown`
///
/// Formats the input file in place; the artifact is the input itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFormatter;

#[async_trait::async_trait]
impl OperationHandler for MarkdownFormatter {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let input = intent.input()?;
        let spec = command(&ctx.config.process.formatter, "formatter")?
            .arg(input.as_path().display().to_string())
            .in_dir(ctx.sandbox.root());

        ctx.collaborators.process.run(&spec).await?;
        tracing::info!(path = %input.relative_display(), "markdown formatted");
        Ok(Outcome::written(input, format!("formatted {}", input.relative_display())))
    }
}
