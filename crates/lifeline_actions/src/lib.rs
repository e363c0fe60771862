//! Host actions for Lifeline.
//!
//! Approved commands end up here. The crate provides:
//!
//! - [`ActionExecutor`] - the seam between the authorization pipeline and the host
//! - [`HostActionExecutor`] - the production executor
//! - [`SystemActions`] - allowlisted service control through a [`ProcessRunner`]
//! - [`FileActions`] - listing, downloads, uploads and `apply` inside the sandbox
//!
//! # Example
//!
//! ```rust,no_run
//! use lifeline_actions::{
//!     ActionExecutor, ActionRequest, FileActions, HostActionExecutor, SystemActions,
//!     TokioProcessRunner,
//! };
//! use lifeline_sandbox::Sandbox;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = Arc::new(TokioProcessRunner::new(Duration::from_secs(10)));
//! let system = SystemActions::new(runner, vec!["docker".to_string()]);
//! let files = FileActions::new(Arc::new(Sandbox::new("/emergency-files")?), 50 * 1024 * 1024);
//! let executor = HostActionExecutor::new(system, files);
//!
//! let output = executor.execute(&ActionRequest::new("status", vec![])).await?;
//! println!("{}", output.text);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod files;
mod host;
mod process;
mod system;

pub use executor::{
    ActionExecutor, ActionOutput, ActionRequest, Upload, UploadReader, UploadSource,
};
pub use files::FileActions;
pub use host::{HOST_COMMANDS, HostActionExecutor};
pub use lifeline_error::{ActionError, ActionErrorKind, ActionResult};
pub use process::{ProcessRunner, TokioProcessRunner};
pub use system::{LOG_TAIL_LINES, ServiceTarget, SystemActions};
