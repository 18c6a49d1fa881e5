//! extract-email / extract-card: single-shot extraction through the
//! completion collaborator

use super::{read_text, write_text};
use crate::catalog::{HandlerContext, OperationHandler, Outcome};
use crate::error::TaskError;
use crate::types::ResolvedIntent;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dispatch_collab::CompletionRequest;
use dispatch_sandbox::SandboxedPath;

const EMAIL_INSTRUCTION: &str = "Extract the sender's email address from the email message. \
Reply with the email address only, nothing else.";

const CARD_INSTRUCTION: &str = "Extract the credit card number from the image. \
Reply with the digits of the card number only, nothing else.";

/// MIME type for a supported image extension
fn image_mime(path: &SandboxedPath) -> Result<&'static str, TaskError> {
    match path.extension().as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        Some("gif") => Ok("image/gif"),
        Some("webp") => Ok("image/webp"),
        other => Err(TaskError::Parse(format!(
            "unsupported image type {}",
            other.map_or_else(|| "(none)".to_string(), |ext| format!("'.{ext}'"))
        ))),
    }
}

/// `data:<mime>;base64,<payload>` URI for raw image bytes
pub(crate) fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Card number with all whitespace removed
pub(crate) fn normalize_card(answer: &str) -> String {
    answer.chars().filter(|c| !c.is_whitespace()).collect()
}

fn require_answer(answer: &str, what: &str) -> Result<(), TaskError> {
    if answer.is_empty() {
        Err(TaskError::malformed_response(format!("empty {what} in completion")))
    } else {
        Ok(())
    }
}

/// Handler for `extract-email`
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailExtractor;

#[async_trait::async_trait]
impl OperationHandler for EmailExtractor {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let input = intent.input()?;
        let output = intent.output()?;
        let message = read_text(input).await?;

        let request = CompletionRequest::text(
            &ctx.config.collaborator.completion_model,
            EMAIL_INSTRUCTION,
            message,
        );
        let answer = ctx.collaborators.completion()?.complete(request).await?;
        let address = answer.trim();
        require_answer(address, "email address")?;

        write_text(output, address).await?;
        tracing::info!("sender address extracted");
        Ok(Outcome::written(output, format!("extracted {address}")))
    }
}

/// Handler for `extract-card`
#[derive(Debug, Default, Clone, Copy)]
pub struct CardExtractor;

#[async_trait::async_trait]
impl OperationHandler for CardExtractor {
    async fn execute(
        &self,
        intent: &ResolvedIntent,
        ctx: &HandlerContext,
    ) -> Result<Outcome, TaskError> {
        let input = intent.input()?;
        let output = intent.output()?;
        let mime = image_mime(input)?;
        let bytes = tokio::fs::read(input.as_path())
            .await
            .map_err(|e| TaskError::io_error(input.as_path(), e))?;

        let request = CompletionRequest::image(
            &ctx.config.collaborator.completion_model,
            CARD_INSTRUCTION,
            data_uri(mime, &bytes),
        );
        let answer = ctx.collaborators.completion()?.complete(request).await?;
        let number = normalize_card(&answer);
        require_answer(&number, "card number")?;

        write_text(output, &number).await?;
        tracing::info!(digits = number.len(), "card number extracted");
        Ok(Outcome::written(output, "extracted card number"))
    }
}
