//! Action executor error types.

use crate::{SandboxError, SandboxErrorKind};

/// Specific action failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ActionErrorKind {
    /// Executor has no handler for the command
    #[display("Unknown command: {}", _0)]
    UnknownCommand(String),

    /// A required argument is missing or malformed
    #[display("Invalid argument for '{}': {}", command, reason)]
    InvalidArgument {
        /// Command that received the argument
        command: String,
        /// Why the argument was rejected
        reason: String,
    },

    /// Service is not in the controllable set
    #[display("Service not allowed: {}", _0)]
    ServiceNotAllowed(String),

    /// External process exited unsuccessfully
    #[display("Command '{}' failed: {}", program, output)]
    CommandFailed {
        /// Program that was run
        program: String,
        /// Combined output or spawn error
        output: String,
    },

    /// External process ran past its deadline
    #[display("Command '{}' timed out after {}s", program, secs)]
    Timeout {
        /// Program that was run
        program: String,
        /// Deadline in seconds
        secs: u64,
    },

    /// Sandboxed file access failed
    #[display("{}", _0)]
    Sandbox(SandboxErrorKind),
}

/// Action error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Action Error: {} at line {} in {}", kind, line, file)]
pub struct ActionError {
    /// The specific error kind
    pub kind: ActionErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl ActionError {
    /// Create a new action error with location tracking.
    #[track_caller]
    pub fn new(kind: ActionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ActionErrorKind {
        &self.kind
    }

    /// Text suitable for a chat reply, without source location.
    pub fn user_message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<SandboxError> for ActionError {
    #[track_caller]
    fn from(err: SandboxError) -> Self {
        Self::new(ActionErrorKind::Sandbox(err.kind))
    }
}

/// Result type for action execution.
pub type ActionResult<T> = Result<T, ActionError>;
