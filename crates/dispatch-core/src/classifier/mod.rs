//! Task text classifiers
//!
//! Two implementations share one contract:
//! - [`DeterministicClassifier`]: ordered keyword rules, pure function of text
//! - [`LlmClassifier`]: one structured completion request
//!
//! `Ok(None)` means "no mapping found" and is not an error.

mod deterministic;
mod llm;

pub use deterministic::DeterministicClassifier;
pub use llm::LlmClassifier;

use crate::error::TaskError;
use crate::types::ParsedIntent;

/// Maps task text to a candidate intent
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classify task text
    async fn classify(&self, text: &str) -> Result<Option<ParsedIntent>, TaskError>;
}
