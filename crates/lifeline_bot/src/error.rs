//! Pipeline and transport error types.

/// Failures raised while delivering or processing a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PipelineErrorKind {
    /// The transport failed to send or delete a message
    #[display("Transport error: {}", _0)]
    Transport(String),

    /// Command processing failed unexpectedly (the executor panicked or was cancelled)
    #[display("Unexpected fault in '{}': {}", command, reason)]
    Fault {
        /// Command being processed
        command: String,
        /// What went wrong
        reason: String,
    },
}

/// Pipeline error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The kind of error
    pub kind: PipelineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new pipeline error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PipelineErrorKind {
        &self.kind
    }
}

/// Result type for pipeline and transport operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
