//! Error types for Lifeline.
//!
//! This crate provides the foundation error types shared by every Lifeline crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use lifeline_error::{LifelineResult, SandboxError, SandboxErrorKind};
//!
//! fn resolve() -> LifelineResult<String> {
//!     Err(SandboxError::new(SandboxErrorKind::PathEscape("../etc".to_string())))?
//! }
//!
//! assert!(resolve().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod config;
mod error;
mod sandbox;

pub use action::{ActionError, ActionErrorKind, ActionResult};
pub use config::ConfigError;
pub use error::{LifelineError, LifelineErrorKind, LifelineResult};
pub use sandbox::{SandboxError, SandboxErrorKind, SandboxResult};
