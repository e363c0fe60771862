//! Transport seam: inbound command events and outbound replies.

use crate::PipelineResult;
use async_trait::async_trait;
use lifeline_actions::Upload;
use lifeline_security::Principal;
use std::path::PathBuf;
use std::time::Duration;

/// Command name carried by attachment events.
pub const UPLOAD_COMMAND: &str = "upload";

/// One inbound message, already attributed to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    /// Sender
    pub principal: Principal,
    /// Lowercase command name without the leading slash
    pub command: String,
    /// Whitespace-separated arguments
    pub args: Vec<String>,
    /// Attached file, if any
    pub upload: Option<Upload>,
    /// Raw message text
    pub text: String,
}

impl CommandEvent {
    /// Event for `command` with `args`.
    pub fn command(principal: Principal, command: impl Into<String>, args: Vec<String>) -> Self {
        let command = command.into().to_lowercase();
        let mut text = format!("/{command}");
        for arg in &args {
            text.push(' ');
            text.push_str(arg);
        }
        Self {
            principal,
            command,
            args,
            upload: None,
            text,
        }
    }

    /// Event carrying an uploaded file.
    pub fn upload(principal: Principal, upload: Upload) -> Self {
        Self {
            principal,
            command: UPLOAD_COMMAND.to_string(),
            args: Vec::new(),
            text: upload.file_name.clone(),
            upload: Some(upload),
        }
    }

    /// Parse a `/command arg...` message. Text that is not a command yields `None`.
    ///
    /// A `@botname` suffix on the command is ignored.
    ///
    /// ```
    /// use lifeline_bot::CommandEvent;
    /// use lifeline_security::Principal;
    ///
    /// let event = CommandEvent::parse(Principal(7), "/Restart@lifeline_bot docker").unwrap();
    /// assert_eq!(event.command, "restart");
    /// assert_eq!(event.args, vec!["docker".to_string()]);
    /// assert!(CommandEvent::parse(Principal(7), "hello").is_none());
    /// ```
    pub fn parse(principal: Principal, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let rest = trimmed.strip_prefix('/')?;

        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head);
        if name.is_empty() {
            return None;
        }

        Some(Self {
            principal,
            command: name.to_lowercase(),
            args: parts.map(str::to_string).collect(),
            upload: None,
            text: trimmed.to_string(),
        })
    }
}

/// Transport-assigned identifier of a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, derive_more::From)]
pub struct MessageId(pub i64);

/// Outbound reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Message text
    pub text: String,
    /// File to send, resolved inside the sandbox
    pub attachment: Option<PathBuf>,
    /// Delete the sent message after this long
    pub delete_after: Option<Duration>,
}

impl Reply {
    /// Plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach a file.
    pub fn with_attachment(mut self, attachment: Option<PathBuf>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Schedule deletion of the sent message.
    pub fn delete_after(mut self, ttl: Duration) -> Self {
        self.delete_after = Some(ttl);
        self
    }
}

/// Sends replies back to principals.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send `reply` to `principal`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the message could not be delivered.
    async fn send(&self, principal: Principal, reply: Reply) -> PipelineResult<MessageId>;

    /// Delete a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the message could not be deleted.
    async fn delete(&self, principal: Principal, message: MessageId) -> PipelineResult<()>;
}

/// Delivers inbound events one at a time, in arrival order.
#[async_trait]
pub trait CommandSource: Send {
    /// Next event, or `None` once the source is exhausted.
    ///
    /// Must be cancel safe: the serving loop drops the future on shutdown.
    async fn next_event(&mut self) -> Option<CommandEvent>;
}
