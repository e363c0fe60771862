//! Top-level error wrapper types.

use crate::{ActionError, ConfigError, SandboxError};

/// Union of every foundation error.
///
/// # Examples
///
/// ```
/// use lifeline_error::{ConfigError, LifelineError};
///
/// let err: LifelineError = ConfigError::new("bad mode").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum LifelineErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Sandbox error
    #[from(SandboxError)]
    Sandbox(SandboxError),
    /// Action executor error
    #[from(ActionError)]
    Action(ActionError),
}

/// Lifeline error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Lifeline Error: {}", _0)]
pub struct LifelineError(Box<LifelineErrorKind>);

impl LifelineError {
    /// Create a new error from a kind.
    pub fn new(kind: LifelineErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LifelineErrorKind {
        &self.0
    }
}

impl<T> From<T> for LifelineError
where
    T: Into<LifelineErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Lifeline operations.
pub type LifelineResult<T> = std::result::Result<T, LifelineError>;
