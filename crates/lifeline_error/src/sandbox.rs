//! Sandbox error types.

/// Kinds of sandbox errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SandboxErrorKind {
    /// The requested path would leave the sandbox root
    #[display("Path escapes sandbox: {}", _0)]
    PathEscape(String),
    /// A streamed write grew past its byte cap
    #[display("File exceeds size limit of {} bytes", _0)]
    SizeExceeded(u64),
    /// Nothing exists at the resolved path
    #[display("Path not found: {}", _0)]
    NotFound(String),
    /// The resolved path is a directory or special file
    #[display("Path is not a file: {}", _0)]
    NotAFile(String),
    /// Underlying filesystem failure
    #[display("Filesystem error: {}", _0)]
    Io(String),
}

/// Sandbox error with location tracking.
///
/// # Examples
///
/// ```
/// use lifeline_error::{SandboxError, SandboxErrorKind};
///
/// let err = SandboxError::new(SandboxErrorKind::NotFound("inbox/a.txt".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Sandbox Error: {} at line {} in {}", kind, line, file)]
pub struct SandboxError {
    /// The kind of error that occurred
    pub kind: SandboxErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SandboxError {
    /// Create a new sandbox error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SandboxErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SandboxErrorKind {
        &self.kind
    }

    /// Text suitable for a chat reply, without source location.
    pub fn user_message(&self) -> String {
        self.kind.to_string()
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
