//! Collaborator request types and traits

use crate::error::CollaboratorError;

/// User content sent alongside the system instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text
    Text(String),
    /// Image encoded as a `data:<mime>;base64,<payload>` URI
    ImageDataUri(String),
}

impl Content {
    /// Text payload, if this is text content
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::ImageDataUri(_) => None,
        }
    }
}

/// Single-shot completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// System instruction
    pub system: String,
    /// User content
    pub content: Content,
}

impl CompletionRequest {
    /// Create text completion request
    #[inline]
    #[must_use]
    pub fn text(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            content: Content::Text(user.into()),
        }
    }

    /// Create image completion request
    #[inline]
    #[must_use]
    pub fn image(
        model: impl Into<String>,
        system: impl Into<String>,
        data_uri: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            content: Content::ImageDataUri(data_uri.into()),
        }
    }
}

/// Batch embedding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingRequest {
    /// Model identifier
    pub model: String,
    /// Texts to embed, in order
    pub inputs: Vec<String>,
}

/// Text-completion collaborator
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion request and return the response text
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError>;
}

/// Sentence-embedding collaborator
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed every input; the result has one vector per input, in input order
    async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<Vec<f32>>, CollaboratorError>;
}
