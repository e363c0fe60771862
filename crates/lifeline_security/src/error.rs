//! Security error types.

use crate::{OperatingMode, Principal};

/// Specific security error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SecurityErrorKind {
    /// Principal exhausted its sliding window
    #[display("Rate limit exceeded for {}: {} calls per {}s", principal, limit, window_secs)]
    RateLimited {
        /// Principal that was throttled
        principal: Principal,
        /// Calls allowed per window
        limit: u32,
        /// Window length in seconds
        window_secs: u64,
    },

    /// Lockdown refused a command other than the unlock command
    #[display("Command '{}' denied: bot is in lockdown", command)]
    LockdownDenied {
        /// Command that was refused
        command: String,
    },

    /// The current mode ranks below the command's requirement
    #[display("Command '{}' requires {} mode (current: {})", command, required, current)]
    ModeDenied {
        /// Command that was refused
        command: String,
        /// Minimum mode for the command
        required: OperatingMode,
        /// Mode at the time of the check
        current: OperatingMode,
    },

    /// No pending action exists for the token
    #[display("Confirmation token not found")]
    TokenNotFound,

    /// Token belongs to a different principal
    #[display("Confirmation token is owned by another principal")]
    TokenNotOwned {
        /// Principal that tried to consume the token
        principal: Principal,
    },

    /// Token outlived its TTL
    #[display("Confirmation token expired")]
    TokenExpired,
}

impl SecurityErrorKind {
    /// Whether the error came from the confirmation token store.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenNotFound | Self::TokenNotOwned { .. } | Self::TokenExpired
        )
    }
}

/// Security error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Security Error: {} at line {} in {}", kind, line, file)]
pub struct SecurityError {
    /// The specific error kind
    pub kind: SecurityErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl SecurityError {
    /// Create a new security error with location tracking.
    #[track_caller]
    pub fn new(kind: SecurityErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SecurityErrorKind {
        &self.kind
    }
}

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;
