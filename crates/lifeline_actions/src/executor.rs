//! Action executor abstraction.
//!
//! The authorization pipeline hands every approved command to an
//! [`ActionExecutor`]. It only cares whether execution succeeded and what text
//! (and optional file) should be sent back; everything else is the executor's
//! business.

use async_trait::async_trait;
use lifeline_error::ActionResult;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Readable upload body.
pub type UploadReader = Box<dyn AsyncRead + Send + Unpin>;

/// Where an upload's bytes come from. Opened only once the upload is accepted,
/// so the body is streamed into the sandbox instead of buffered.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Open the body for reading.
    async fn open(&self) -> std::io::Result<UploadReader>;
}

struct InMemory(Vec<u8>);

#[async_trait]
impl UploadSource for InMemory {
    async fn open(&self) -> std::io::Result<UploadReader> {
        Ok(Box::new(std::io::Cursor::new(self.0.clone())))
    }
}

/// File received from the transport alongside a message.
#[derive(Clone)]
pub struct Upload {
    /// Name reported by the sender. May be empty or contain path segments.
    pub file_name: String,
    /// Size declared by the transport, checked before the body is opened
    pub size: Option<u64>,
    source: Arc<dyn UploadSource>,
}

impl Upload {
    /// Upload whose contents are already in memory.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::streaming(file_name, Some(size), Arc::new(InMemory(data)))
    }

    /// Upload read from `source` on demand.
    pub fn streaming(
        file_name: impl Into<String>,
        size: Option<u64>,
        source: Arc<dyn UploadSource>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            size,
            source,
        }
    }

    /// Open the body.
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error if the body cannot be read.
    pub async fn open(&self) -> std::io::Result<UploadReader> {
        self.source.open().await
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Upload {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
            && self.size == other.size
            && Arc::ptr_eq(&self.source, &other.source)
    }
}

impl Eq for Upload {}

/// An approved command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Command name without the leading slash
    pub command: String,
    /// Arguments in order
    pub args: Vec<String>,
    /// Attached file, for `upload`
    pub upload: Option<Upload>,
}

impl ActionRequest {
    /// Request for `command` with `args`.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            upload: None,
        }
    }

    /// Request storing an uploaded file.
    pub fn upload(upload: Upload) -> Self {
        Self {
            command: "upload".to_string(),
            args: Vec::new(),
            upload: Some(upload),
        }
    }

    /// First argument, if any.
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Result of a successful action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    /// Reply text
    pub text: String,
    /// File to send back, already resolved inside the sandbox
    pub attachment: Option<PathBuf>,
}

impl ActionOutput {
    /// Text-only output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    /// Output carrying a file.
    pub fn with_attachment(text: impl Into<String>, attachment: PathBuf) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }
}

/// Runs approved commands against the host.
///
/// # Tracing
///
/// Implementations should instrument `execute` with the command name as a
/// span field and emit `error!` when execution fails.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute `request`.
    ///
    /// # Errors
    ///
    /// Returns error if the command is unknown, its arguments are invalid, or
    /// the underlying action fails.
    async fn execute(&self, request: &ActionRequest) -> ActionResult<ActionOutput>;

    /// Whether this executor handles `command`.
    fn supports_command(&self, command: &str) -> bool;
}
