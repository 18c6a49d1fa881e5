//! HTTP collaborator over an OpenAI-compatible API
//!
//! Serves both completions (`/chat/completions`) and embeddings
//! (`/embeddings`). Authentication material is handed in by the caller;
//! this client never reads the environment.

use crate::error::CollaboratorError;
use crate::types::{CompletionClient, CompletionRequest, Content, EmbeddingClient, EmbeddingRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for [`OpenAiClient`]
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create config for a base URL with a 30s timeout
    #[inline]
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for completion and embedding requests
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a client
    ///
    /// # Errors
    /// Returns `NotConfigured` if the underlying HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::NotConfigured(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Full URL for an endpoint below the base
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, CollaboratorError> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "collaborator request");

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status { status, body });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CollaboratorError::malformed(e.to_string()))
    }

    fn transport_error(&self, error: &reqwest::Error) -> CollaboratorError {
        if error.is_timeout() {
            CollaboratorError::Timeout {
                duration_secs: self.config.timeout.as_secs(),
            }
        } else {
            CollaboratorError::Unreachable(error.to_string())
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CollaboratorError> {
        let body = ChatRequest::from(&request);
        let response: ChatResponse = self.post("chat/completions", &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::malformed("completion has no choices"))
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        let expected = request.inputs.len();
        let body = EmbeddingBody {
            model: request.model,
            input: request.inputs,
        };
        let response: EmbeddingResponse = self.post("embeddings", &body).await?;
        response.into_vectors(expected)
    }
}

// Chat completion format
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

impl From<&CompletionRequest> for ChatRequest {
    fn from(request: &CompletionRequest) -> Self {
        let user = match &request.content {
            Content::Text(text) => MessageContent::Text(text.clone()),
            Content::ImageDataUri(uri) => MessageContent::Parts(vec![ContentPart::ImageUrl {
                image_url: ImageUrl { url: uri.clone() },
            }]),
        };

        Self {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(request.system.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// Embedding format
#[derive(Debug, Serialize)]
struct EmbeddingBody {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Order vectors by index and check one vector per input
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        if self.data.len() != expected {
            return Err(CollaboratorError::malformed(format!(
                "expected {expected} embeddings, got {}",
                self.data.len()
            )));
        }
        self.data.sort_by_key(|d| d.index);
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}
