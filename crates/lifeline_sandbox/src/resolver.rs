//! Lexical sandbox path resolver.

use lifeline_error::{SandboxError, SandboxErrorKind, SandboxResult};
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Conventional upload staging directory.
pub const INBOX_DIR: &str = "inbox";
/// Conventional directory for generated archives.
pub const SNAPSHOTS_DIR: &str = "snapshots";

const COPY_BUFFER_BYTES: usize = 32 * 1024;

/// Filesystem region that every file-facing command is confined to.
///
/// Resolution never touches the filesystem: `.` and `..` are collapsed
/// lexically and the joined result is checked component-wise against the
/// root. Symlinks inside the root are followed by later I/O as usual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`. Relative roots are made absolute
    /// against the working directory.
    ///
    /// # Errors
    ///
    /// Returns error if the root is empty or the working directory is unavailable.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl AsRef<Path>) -> SandboxResult<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(SandboxError::new(SandboxErrorKind::Io(
                "sandbox root is required".to_string(),
            )));
        }

        let absolute = std::path::absolute(root).map_err(|e| {
            SandboxError::new(SandboxErrorKind::Io(format!("{}: {}", root.display(), e)))
        })?;
        let root = clean_absolute(&absolute);

        tracing::debug!(root = %root.display(), "Created sandbox");
        Ok(Self { root })
    }

    /// Absolute sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` to an absolute path inside the root.
    ///
    /// # Errors
    ///
    /// Returns `PathEscape` for inputs with a leading separator and for inputs
    /// whose `..` segments climb above the root.
    pub fn resolve(&self, relative: &str) -> SandboxResult<PathBuf> {
        if relative.starts_with('/') || relative.starts_with('\\') {
            tracing::debug!(path = relative, "Rejected absolute path");
            return Err(escape(relative));
        }

        let Some(cleaned) = clean_relative(Path::new(relative)) else {
            tracing::debug!(path = relative, "Rejected traversal outside sandbox");
            return Err(escape(relative));
        };

        let full = self.root.join(cleaned);
        if !self.contains(&full) {
            return Err(escape(relative));
        }
        Ok(full)
    }

    /// Whether an arbitrary path lies inside the root.
    pub fn within(&self, target: impl AsRef<Path>) -> bool {
        self.locate(target).is_some()
    }

    /// Normalized absolute form of an arbitrary path, if it lies inside the root.
    pub fn locate(&self, target: impl AsRef<Path>) -> Option<PathBuf> {
        let absolute = std::path::absolute(target.as_ref()).ok()?;
        let cleaned = clean_absolute(&absolute);
        self.contains(&cleaned).then_some(cleaned)
    }

    // `Path::starts_with` compares whole components, so `/sandbox-other`
    // does not match a root of `/sandbox`.
    fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.root)
    }

    /// Resolve `relative` and create it as a directory, with any missing parents.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_dir(&self, relative: &str) -> SandboxResult<PathBuf> {
        let path = self.resolve(relative)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| io_error(relative, e))?;
        tracing::debug!(path = %path.display(), "Ensured sandbox directory");
        Ok(path)
    }

    /// Stream `reader` into `relative`, aborting once more than `max_bytes`
    /// have been read. A partially written file is removed on abort.
    ///
    /// Returns the resolved path and the number of bytes written.
    #[tracing::instrument(skip(self, reader))]
    pub async fn write_file<R>(
        &self,
        relative: &str,
        mut reader: R,
        max_bytes: u64,
    ) -> SandboxResult<(PathBuf, u64)>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(relative, e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o640);
        let mut file = options
            .open(&path)
            .await
            .map_err(|e| io_error(relative, e))?;

        let mut written: u64 = 0;
        let mut buffer = vec![0u8; COPY_BUFFER_BYTES];
        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| io_error(relative, e))?;
            if n == 0 {
                break;
            }

            written += n as u64;
            if written > max_bytes {
                drop(file);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove oversized partial file");
                }
                tracing::warn!(path = relative, max_bytes, "Write aborted, size limit exceeded");
                return Err(SandboxError::new(SandboxErrorKind::SizeExceeded(max_bytes)));
            }

            file.write_all(&buffer[..n])
                .await
                .map_err(|e| io_error(relative, e))?;
        }

        file.flush().await.map_err(|e| io_error(relative, e))?;
        tracing::info!(path = %path.display(), bytes = written, "Wrote sandbox file");
        Ok((path, written))
    }

    /// Whether `relative` resolves and exists. Resolution errors count as absent.
    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Sorted entry names of the directory at `relative`.
    #[tracing::instrument(skip(self))]
    pub async fn list_dir(&self, relative: &str) -> SandboxResult<Vec<String>> {
        let path = self.resolve(relative)?;
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error(relative, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(relative, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Resolve `relative` to a regular file no larger than `max_bytes`.
    ///
    /// Returns the resolved path and file size.
    #[tracing::instrument(skip(self))]
    pub async fn regular_file(&self, relative: &str, max_bytes: u64) -> SandboxResult<(PathBuf, u64)> {
        let path = self.resolve(relative)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(relative, e))?;

        if !metadata.is_file() {
            return Err(SandboxError::new(SandboxErrorKind::NotAFile(relative.to_string())));
        }
        if metadata.len() > max_bytes {
            return Err(SandboxError::new(SandboxErrorKind::SizeExceeded(max_bytes)));
        }
        Ok((path, metadata.len()))
    }

    /// Move `from` to `to`, both resolved inside the sandbox.
    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, from: &str, to: &str) -> SandboxResult<PathBuf> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| io_error(from, e))?;
        tracing::info!(from = %source.display(), to = %target.display(), "Moved sandbox file");
        Ok(target)
    }
}

/// Collapse `.` and `..` in a relative path. `None` when `..` climbs past the start.
fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    return None;
                }
            }
            Component::Normal(segment) => cleaned.push(segment),
        }
    }
    Some(cleaned)
}

/// Collapse `.` and `..` in an absolute path; `..` at the root stays at the root.
fn clean_absolute(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

fn escape(relative: &str) -> SandboxError {
    SandboxError::new(SandboxErrorKind::PathEscape(relative.to_string()))
}

fn io_error(relative: &str, err: std::io::Error) -> SandboxError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SandboxError::new(SandboxErrorKind::NotFound(relative.to_string()))
    } else {
        SandboxError::new(SandboxErrorKind::Io(format!("{}: {}", relative, err)))
    }
}
