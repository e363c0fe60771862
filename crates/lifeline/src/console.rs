//! Console transport: commands on stdin, replies on stdout.
//!
//! The console speaks as one principal. `/upload <local path>` delivers the
//! local file as an attachment event; its body is read only if accepted.

use async_trait::async_trait;
use lifeline_actions::{Upload, UploadReader, UploadSource};
use lifeline_bot::{
    CommandEvent, CommandSource, MessageId, PipelineError, PipelineErrorKind, PipelineResult,
    Reply, Responder, UPLOAD_COMMAND,
};
use lifeline_security::Principal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reads `/command arg...` lines.
#[derive(Debug)]
pub struct ConsoleSource<R> {
    principal: Principal,
    lines: Lines<R>,
}

impl ConsoleSource<BufReader<tokio::io::Stdin>> {
    /// Source reading the process stdin.
    pub fn stdin(principal: Principal) -> Self {
        Self::new(principal, BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Source reading lines from `reader` on behalf of `principal`.
    pub fn new(principal: Principal, reader: R) -> Self {
        Self {
            principal,
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> CommandSource for ConsoleSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<CommandEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    return None;
                }
            };

            let Some(event) = CommandEvent::parse(self.principal, &line) else {
                if !line.trim().is_empty() {
                    debug!("Ignoring non-command input");
                }
                continue;
            };

            if event.command == UPLOAD_COMMAND
                && let Some(path) = event.args.first()
            {
                match upload_event(self.principal, path).await {
                    Some(upload) => return Some(upload),
                    None => continue,
                }
            }

            return Some(event);
        }
    }
}

/// Writes replies as plain text.
#[derive(Debug)]
pub struct ConsoleResponder<W> {
    out: Mutex<W>,
    next_id: AtomicI64,
}

impl ConsoleResponder<tokio::io::Stdout> {
    /// Responder writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleResponder<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Responder writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicI64::new(1),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    async fn write(&self, text: &str) -> PipelineResult<()> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes())
            .await
            .map_err(|e| PipelineError::new(PipelineErrorKind::Transport(e.to_string())))?;
        out.flush()
            .await
            .map_err(|e| PipelineError::new(PipelineErrorKind::Transport(e.to_string())))
    }
}

#[async_trait]
impl<W> Responder for ConsoleResponder<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, _principal: Principal, reply: Reply) -> PipelineResult<MessageId> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut text = format!("[{id}] {}\n", reply.text);
        if let Some(attachment) = &reply.attachment {
            text.push_str(&format!("[{id}] attachment: {}\n", attachment.display()));
        }
        if let Some(ttl) = reply.delete_after {
            text.push_str(&format!("[{id}] expires in {}s\n", ttl.as_secs()));
        }

        self.write(&text).await?;
        Ok(id)
    }

    async fn delete(&self, _principal: Principal, message: MessageId) -> PipelineResult<()> {
        self.write(&format!("[{message}] expired\n")).await
    }
}

/// Upload body streamed from a local file.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    /// Body read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UploadSource for LocalFile {
    async fn open(&self) -> std::io::Result<UploadReader> {
        Ok(Box::new(tokio::fs::File::open(&self.path).await?))
    }
}

async fn upload_event(principal: Principal, path: &str) -> Option<CommandEvent> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            warn!(path, "Upload path is not a regular file");
            return None;
        }
        Err(e) => {
            warn!(path, error = %e, "Cannot read local file for upload");
            return None;
        }
    };

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let upload = Upload::streaming(
        file_name,
        Some(metadata.len()),
        Arc::new(LocalFile::new(path)),
    );
    Some(CommandEvent::upload(principal, upload))
}
