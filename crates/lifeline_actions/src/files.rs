//! Sandboxed file actions: listing, downloads, uploads and applying staged files.

use crate::{ActionOutput, Upload};
use lifeline_error::{ActionError, ActionErrorKind, ActionResult, SandboxError, SandboxErrorKind};
use lifeline_sandbox::{INBOX_DIR, SNAPSHOTS_DIR, Sandbox};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// File operations confined to a [`Sandbox`].
///
/// Uploads and applied files never land on a reserved path or on a
/// directory containing one. The inbox and snapshot directories are always
/// reserved; [`FileActions::with_reserved`] adds more, such as the audit log.
#[derive(Debug, Clone)]
pub struct FileActions {
    sandbox: Arc<Sandbox>,
    max_bytes: u64,
    reserved: Vec<PathBuf>,
}

impl FileActions {
    /// Create file actions capping transfers at `max_bytes`.
    pub fn new(sandbox: Arc<Sandbox>, max_bytes: u64) -> Self {
        let reserved = [INBOX_DIR, SNAPSHOTS_DIR]
            .into_iter()
            .filter_map(|dir| sandbox.resolve(dir).ok())
            .collect();
        Self {
            sandbox,
            max_bytes,
            reserved,
        }
    }

    /// Protect `paths` from being replaced. Paths outside the sandbox are ignored.
    pub fn with_reserved(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        for path in paths {
            if let Some(located) = self.sandbox.locate(&path) {
                self.reserved.push(located);
            }
        }
        self
    }

    /// Whether writing to `target` would replace a reserved path.
    pub fn is_reserved(&self, target: &Path) -> bool {
        self.reserved.iter().any(|reserved| reserved.starts_with(target))
    }

    fn guard(&self, command: &str, name: &str, target: &Path) -> ActionResult<()> {
        if self.is_reserved(target) {
            warn!(target = %target.display(), "Refused write to reserved path");
            return Err(ActionError::new(ActionErrorKind::InvalidArgument {
                command: command.to_string(),
                reason: format!("{name} is reserved"),
            }));
        }
        Ok(())
    }

    /// Largest file accepted or sent, in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Sorted listing of a sandbox directory, one name per line.
    #[instrument(skip(self))]
    pub async fn list(&self, path: &str) -> ActionResult<String> {
        let names = self.sandbox.list_dir(path).await?;
        if names.is_empty() {
            return Ok("(empty)".to_string());
        }
        Ok(names.join("\n"))
    }

    /// Prepare a sandbox file to be sent back as an attachment.
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> ActionResult<ActionOutput> {
        let (resolved, size) = self.sandbox.regular_file(path, self.max_bytes).await?;
        let name = display_name(&resolved);
        Ok(ActionOutput::with_attachment(
            format!("Sending {name} ({size} bytes)"),
            resolved,
        ))
    }

    /// Store an upload under the inbox, keeping only its base name.
    ///
    /// A declared size over the cap is refused before the body is opened;
    /// otherwise the body is streamed and cut off at the cap.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, declared = ?upload.size))]
    pub async fn save_upload(&self, upload: &Upload) -> ActionResult<String> {
        if let Some(size) = upload.size
            && size > self.max_bytes
        {
            warn!(size, max_bytes = self.max_bytes, "Declared upload size over limit");
            return Err(SandboxError::new(SandboxErrorKind::SizeExceeded(self.max_bytes)).into());
        }

        let name = base_name(&upload.file_name)
            .unwrap_or_else(|| format!("upload-{}", chrono::Utc::now().timestamp()));
        let relative = format!("{INBOX_DIR}/{name}");
        self.guard("upload", &name, &self.sandbox.resolve(&relative)?)?;

        let body = upload.open().await.map_err(|e| {
            SandboxError::new(SandboxErrorKind::Io(format!("{}: {}", upload.file_name, e)))
        })?;
        let (path, written) = self
            .sandbox
            .write_file(&relative, body, self.max_bytes)
            .await?;

        info!(path = %path.display(), bytes = written, "Upload stored");
        Ok(format!("File stored in inbox: {}", path.display()))
    }

    /// Move `inbox/<file>` to the sandbox root.
    #[instrument(skip(self))]
    pub async fn apply(&self, file: &str) -> ActionResult<String> {
        let Some(name) = base_name(file) else {
            return Err(ActionError::new(ActionErrorKind::InvalidArgument {
                command: "apply".to_string(),
                reason: "file name required".to_string(),
            }));
        };
        self.guard("apply", &name, &self.sandbox.resolve(&name)?)?;

        let target = self
            .sandbox
            .rename(&format!("{INBOX_DIR}/{name}"), &name)
            .await?;

        info!(target = %target.display(), "Staged file applied");
        Ok(format!("Applied {name} to sandbox root"))
    }
}

/// Final normal component of `name`, if it has one.
fn base_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
