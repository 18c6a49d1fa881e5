//! Dispatch Sandbox
//!
//! Confines every file argument of a task to a single configured data root.
//!
//! # Core Concepts
//!
//! - [`PathSandbox`]: Canonicalizes raw paths and rejects anything that leaves the root
//! - [`SandboxedPath`]: Proof that a path was admitted by a sandbox
//! - [`SandboxError`]: Escape, missing input and I/O failures
//!
//! # Example
//!
//! ```rust,ignore
//! use dispatch_sandbox::PathSandbox;
//!
//! let sandbox = PathSandbox::new("/srv/data")?.with_virtual_root("/data");
//!
//! // "/data/dates.txt" names "/srv/data/dates.txt"
//! let input = sandbox.resolve_existing("/data/dates.txt")?;
//!
//! // Traversal is rejected after canonicalization
//! assert!(sandbox.resolve("/data/../etc/passwd").is_err());
//! ```

#![warn(unreachable_pub)]

mod error;
mod path;
mod sandbox;

pub use error::SandboxError;
pub use path::SandboxedPath;
pub use sandbox::PathSandbox;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
