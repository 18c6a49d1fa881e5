//! Dispatch Core - task classification and dispatch
//!
//! Turns a free-text task description into one validated operation and runs it:
//! - Classifies text with ordered keyword rules, falling back to a language model
//! - Merges candidates field by field and checks them against the operation catalog
//! - Sandboxes every path beneath the configured data root
//! - Executes the operation and reports a structured result
//!
//! # Example
//!
//! ```rust,ignore
//! use dispatch_core::{EngineConfig, TaskEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TaskEngine::from_config(EngineConfig::new("/srv/data"))?;
//!
//! let result = engine
//!     .run("Count the Wednesdays in /data/dates.txt and write the count to /data/dates-wednesdays.txt")
//!     .await;
//!
//! println!("{}", serde_json::to_string(&result)?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod ops;
pub mod resolver;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use catalog::{
    Collaborators, HandlerContext, InputKind, OperationCatalog, OperationDescriptor,
    OperationHandler, Outcome, PathRole,
};
pub use classifier::{Classifier, DeterministicClassifier, LlmClassifier};
pub use config::{CollaboratorConfig, EngineConfig, PatternConfig, ProcessConfig, SalesConfig};
pub use engine::TaskEngine;
pub use error::{ConfigError, ErrorKind, TaskError};
pub use executor::OperationExecutor;
pub use resolver::IntentResolver;
pub use state::{RequestLifecycle, RequestState};
pub use types::{
    ExecutionResult, ExecutionStatus, IntentSource, OperationId, Parameters, ParsedIntent,
    ResolvedIntent, TaskRequest,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the engine
    pub use crate::{
        Collaborators, EngineConfig, ErrorKind, ExecutionResult, ExecutionStatus, OperationId,
        TaskEngine, TaskError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
