//! Dispatch Collaborators
//!
//! Narrow, mockable contracts for everything the engine does not compute
//! itself:
//!
//! - [`CompletionClient`]: model id + system instruction + user content → text
//! - [`EmbeddingClient`]: model id + texts → one vector per text
//! - [`ProcessRunner`]: command + arguments + expected exit code
//!
//! Concrete implementations talk to an OpenAI-compatible HTTP API
//! ([`OpenAiClient`]) and spawn local processes ([`TokioProcessRunner`]).
//! Every call is a single request/response bounded by a timeout; a timeout
//! is reported, never retried.

#![warn(unreachable_pub)]

pub mod error;
pub mod http;
pub mod process;
pub mod types;

pub use error::CollaboratorError;
pub use http::{OpenAiClient, OpenAiConfig};
pub use process::{ProcessOutput, ProcessRunner, ProcessSpec, TokioProcessRunner};
pub use types::{CompletionClient, CompletionRequest, Content, EmbeddingClient, EmbeddingRequest};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
