//! Command authorization pipeline for Lifeline.
//!
//! This crate composes the trust primitives of `lifeline_security` into the
//! path every inbound chat command takes before anything runs on the host.
//!
//! # Architecture
//!
//! - [`Pipeline`] - allowlist, rate limit, lockdown, mode, confirmation, dispatch, audit
//! - [`catalog`] - per-command policy (mode requirement, confirmation, sensitivity)
//! - [`CommandSource`] / [`Responder`] - transport seam
//! - [`LifelineServer`] - one-at-a-time serving loop with graceful shutdown
//! - [`DeletionScheduler`] / [`TokenSweeper`] - cancellable background work
//! - [`LifelineConfig`] - layered configuration
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = Arc::new(Pipeline::new(guards, executor, responder));
//! let server = LifelineServer::new(pipeline).with_sweeper(sweeper);
//! let (tx, rx) = tokio::sync::watch::channel(false);
//! server.run(source, rx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
mod config;
mod error;
mod event;
mod pipeline;
mod scheduler;
mod server;

pub use config::{
    LifelineConfig, LoggingConfig, RepliesConfig, SandboxConfig, SecurityConfig, ServicesConfig,
};
pub use error::{PipelineError, PipelineErrorKind, PipelineResult};
pub use event::{CommandEvent, CommandSource, MessageId, Reply, Responder, UPLOAD_COMMAND};
pub use pipeline::{
    CommandOutcome, DEFAULT_SENSITIVE_TTL, Guards, INVALID_TOKEN_NOTICE, LOCKDOWN_NOTICE, Pipeline,
    UNKNOWN_COMMAND_NOTICE,
};
pub use scheduler::{DeletionScheduler, TokenSweeper};
pub use server::LifelineServer;
