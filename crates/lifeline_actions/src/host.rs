//! Executor dispatching approved commands to system and file actions.

use crate::{ActionExecutor, ActionOutput, ActionRequest, FileActions, SystemActions};
use async_trait::async_trait;
use lifeline_error::{ActionError, ActionErrorKind, ActionResult};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Commands handled by [`HostActionExecutor`].
pub const HOST_COMMANDS: &[&str] = &[
    "health", "status", "logs", "restart", "cleanup", "reboot", "ls", "get", "upload", "apply",
];

/// Production [`ActionExecutor`] for a single host.
#[derive(Debug)]
pub struct HostActionExecutor {
    system: SystemActions,
    files: FileActions,
    started: Instant,
}

impl HostActionExecutor {
    /// Create an executor over `system` and `files`.
    pub fn new(system: SystemActions, files: FileActions) -> Self {
        Self {
            system,
            files,
            started: Instant::now(),
        }
    }

    /// Service actions.
    pub fn system(&self) -> &SystemActions {
        &self.system
    }

    /// File actions.
    pub fn files(&self) -> &FileActions {
        &self.files
    }

    async fn health(&self) -> String {
        let uptime = self.started.elapsed().as_secs();
        let status = self.system.status().await;
        format!(
            "Lifeline up {}h{:02}m{:02}s\nServices:\n{}",
            uptime / 3600,
            (uptime % 3600) / 60,
            uptime % 60,
            status
        )
    }

    async fn dispatch(&self, request: &ActionRequest) -> ActionResult<ActionOutput> {
        let output = match request.command.as_str() {
            "health" => ActionOutput::text(self.health().await),
            "status" => ActionOutput::text(self.system.status().await),
            "logs" => ActionOutput::text(self.system.tail_logs(required(request, "service")?).await?),
            "restart" => ActionOutput::text(self.system.restart(required(request, "service")?).await?),
            "cleanup" => ActionOutput::text(self.system.cleanup().await?),
            "reboot" => ActionOutput::text(self.system.reboot().await?),
            "ls" => ActionOutput::text(self.files.list(request.first_arg().unwrap_or(".")).await?),
            "get" => self.files.get(required(request, "path")?).await?,
            "apply" => ActionOutput::text(self.files.apply(required(request, "file")?).await?),
            "upload" => {
                let upload = request.upload.as_ref().ok_or_else(|| {
                    ActionError::new(ActionErrorKind::InvalidArgument {
                        command: "upload".to_string(),
                        reason: "no attachment".to_string(),
                    })
                })?;
                ActionOutput::text(self.files.save_upload(upload).await?)
            }
            other => {
                return Err(ActionError::new(ActionErrorKind::UnknownCommand(
                    other.to_string(),
                )));
            }
        };
        Ok(output)
    }
}

#[async_trait]
impl ActionExecutor for HostActionExecutor {
    #[instrument(skip(self, request), fields(command = %request.command, arg_count = request.args.len()))]
    async fn execute(&self, request: &ActionRequest) -> ActionResult<ActionOutput> {
        info!("Executing host action");

        match self.dispatch(request).await {
            Ok(output) => {
                info!(has_attachment = output.attachment.is_some(), "Host action succeeded");
                Ok(output)
            }
            Err(e) => {
                error!(error = %e, "Host action failed");
                Err(e)
            }
        }
    }

    fn supports_command(&self, command: &str) -> bool {
        HOST_COMMANDS.contains(&command)
    }
}

fn required<'a>(request: &'a ActionRequest, name: &str) -> ActionResult<&'a str> {
    request.first_arg().ok_or_else(|| {
        ActionError::new(ActionErrorKind::InvalidArgument {
            command: request.command.clone(),
            reason: format!("missing <{name}>"),
        })
    })
}
