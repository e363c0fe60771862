//! Trust and command-authorization primitives for Lifeline.
//!
//! Every inbound chat command passes through these gates before any privileged
//! action is allowed to run on the host.
//!
//! # Architecture
//!
//! The framework consists of 5 components:
//!
//! 1. **Allowlist** - Static set of principals allowed to talk to the bot
//! 2. **Rate Limit** - Per-principal sliding window throttling
//! 3. **Operating Mode** - Process-wide posture (readonly, emergency, lockdown)
//! 4. **Confirmation** - Single-use tokens for destructive commands
//! 5. **Audit** - Append-only record of every decision and outcome
//!
//! Each component owns its own lock and is meant to be shared behind an `Arc`.
//! None of them owns another; composition happens in the command pipeline.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod allowlist;
mod audit;
mod confirm;
mod error;
mod mode;
mod principal;
mod rate_limit;

pub use allowlist::Allowlist;
pub use audit::{AuditField, AuditLogger, AuditRecord, AuditStatus};
pub use confirm::{ConfirmationManager, PendingAction};
pub use error::{SecurityError, SecurityErrorKind, SecurityResult};
pub use mode::{ModeManager, OperatingMode};
pub use principal::Principal;
pub use rate_limit::SlidingWindowLimiter;
