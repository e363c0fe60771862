//! Command authorization pipeline.
//!
//! Every inbound event passes the gates in order:
//!
//! 1. Identity allowlist (unknown principals are dropped silently)
//! 2. Rate limiter
//! 3. Lockdown filter (only `/unlock` and `/confirm` pass)
//! 4. Catalog lookup and per-command mode requirement
//! 5. Destructive commands get a confirmation token instead of running
//! 6. `/confirm` consumes a token; the action runs only if its mode still allows it
//! 7. Everything else is dispatched to the [`ActionExecutor`]
//!
//! Executor calls run in their own task, so a panic inside an action is
//! contained to the command that caused it.

use crate::catalog::{self, CONFIRM_COMMAND, CommandPolicy, Handler, UNLOCK_COMMAND};
use crate::{
    CommandEvent, DeletionScheduler, LifelineConfig, PipelineError, PipelineErrorKind, Reply,
    Responder,
};
use lifeline_actions::{ActionExecutor, ActionOutput, ActionRequest, Upload};
use lifeline_security::{
    Allowlist, AuditField, AuditLogger, AuditStatus, ConfirmationManager, ModeManager,
    OperatingMode, Principal, SlidingWindowLimiter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Default lifetime of sensitive replies.
pub const DEFAULT_SENSITIVE_TTL: Duration = Duration::from_secs(3600);

/// Reply sent for an unknown command.
pub const UNKNOWN_COMMAND_NOTICE: &str = "Unknown command. Use /help";
/// Reply sent while locked down.
pub const LOCKDOWN_NOTICE: &str = "Bot is in lockdown. Only /unlock allowed.";
/// Reply sent for any failed token.
pub const INVALID_TOKEN_NOTICE: &str = "Invalid/expired token";

/// The security components consulted for every command.
#[derive(Debug, Clone)]
pub struct Guards {
    /// Identity allowlist
    pub allowlist: Arc<Allowlist>,
    /// Per-principal rate limiter
    pub limiter: Arc<SlidingWindowLimiter>,
    /// Operating mode
    pub modes: Arc<ModeManager>,
    /// Confirmation tokens
    pub confirm: Arc<ConfirmationManager>,
    /// Audit trail
    pub audit: Arc<AuditLogger>,
}

impl Guards {
    /// Build every guard from configuration.
    pub fn from_config(config: &LifelineConfig) -> Self {
        Self {
            allowlist: Arc::new(Allowlist::new(
                config.security.allowed_principals.iter().copied().map(Principal),
            )),
            limiter: Arc::new(SlidingWindowLimiter::new(
                config.security.rate_limit,
                config.rate_window(),
            )),
            modes: Arc::new(ModeManager::new(config.security.default_mode)),
            confirm: Arc::new(ConfirmationManager::new(config.confirm_ttl())),
            audit: Arc::new(AuditLogger::new(config.audit_path())),
        }
    }
}

/// Terminal state of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CommandOutcome {
    /// Principal not allowlisted; nothing was sent or recorded
    #[display("dropped")]
    Dropped,
    /// Refused by the rate limiter
    #[display("rate_limited")]
    RateLimited,
    /// Refused by the lockdown filter
    #[display("lockdown_denied")]
    LockdownDenied,
    /// Refused because the current mode is too low
    #[display("mode_denied")]
    ModeDenied,
    /// Dispatched to the executor
    #[display("executed(success={})", success)]
    Executed {
        /// Whether the executor succeeded
        success: bool,
    },
    /// Destructive command waiting for `/confirm`
    #[display("pending_confirmation")]
    PendingConfirmation {
        /// Token to confirm with
        token: String,
    },
    /// First confirmation of a double-confirm command accepted
    #[display("pending_second_confirmation")]
    PendingSecondConfirmation {
        /// Token for the second round
        token: String,
    },
    /// Token unknown, not owned by the sender, or expired
    #[display("token_rejected")]
    TokenRejected,
    /// Answered without running an action (help, usage, mode changes, unknown command)
    #[display("replied")]
    Replied,
    /// Processing failed unexpectedly
    #[display("faulted")]
    Faulted,
}

/// Composes the guards with an executor and a responder.
pub struct Pipeline {
    guards: Guards,
    executor: Arc<dyn ActionExecutor>,
    responder: Arc<dyn Responder>,
    deletions: Arc<DeletionScheduler>,
    sensitive_ttl: Duration,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("guards", &self.guards)
            .field("sensitive_ttl", &self.sensitive_ttl)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        guards: Guards,
        executor: Arc<dyn ActionExecutor>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            guards,
            executor,
            responder,
            deletions: Arc::new(DeletionScheduler::new()),
            sensitive_ttl: DEFAULT_SENSITIVE_TTL,
        }
    }

    /// Delete sensitive replies after `ttl`.
    pub fn with_sensitive_ttl(mut self, ttl: Duration) -> Self {
        self.sensitive_ttl = ttl;
        self
    }

    /// Use a shared deletion scheduler.
    pub fn with_deletions(mut self, deletions: Arc<DeletionScheduler>) -> Self {
        self.deletions = deletions;
        self
    }

    /// Security components.
    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    /// Scheduler owning sensitive-reply deletions.
    pub fn deletions(&self) -> &Arc<DeletionScheduler> {
        &self.deletions
    }

    /// Executor-handled catalog commands the executor does not support.
    pub fn unsupported_commands(&self) -> Vec<&'static str> {
        catalog::executor_commands()
            .filter(|command| !self.executor.supports_command(command))
            .collect()
    }

    /// Run one event through every gate.
    #[instrument(skip(self, event), fields(principal = %event.principal, command = %event.command))]
    pub async fn handle(&self, event: CommandEvent) -> CommandOutcome {
        let principal = event.principal;

        if !self.guards.allowlist.contains(principal) {
            debug!("Dropping event from principal outside the allowlist");
            return CommandOutcome::Dropped;
        }

        if let Err(e) = self.guards.limiter.check(principal) {
            warn!(error = %e.kind(), "Rate limit exceeded");
            self.reply(
                principal,
                Reply::text(format!(
                    "Rate limit exceeded. Slow down ({}/{}s).",
                    self.guards.limiter.max_calls(),
                    self.guards.limiter.window().as_secs()
                )),
            )
            .await;
            self.guards.audit.write(
                principal,
                "ratelimit",
                AuditStatus::Deny,
                vec![AuditField::new("text", event.text.clone())],
            );
            return CommandOutcome::RateLimited;
        }

        let policy = catalog::lookup(&event.command);

        // Confirmation stays reachable in lockdown; execution re-checks the mode
        let confirming = policy.is_some_and(|p| p.handler == Handler::Confirm);
        if !confirming
            && let Err(e) = self
                .guards
                .modes
                .check_lockdown(&event.command, UNLOCK_COMMAND)
        {
            debug!(error = %e.kind(), "Refused during lockdown");
            self.reply(principal, Reply::text(LOCKDOWN_NOTICE)).await;
            self.guards
                .audit
                .write(principal, &slash(&event.command), AuditStatus::Deny, vec![]);
            return CommandOutcome::LockdownDenied;
        }

        let Some(policy) = policy else {
            debug!("Unknown command");
            self.reply(principal, Reply::text(UNKNOWN_COMMAND_NOTICE)).await;
            return CommandOutcome::Replied;
        };

        if policy.requires_emergency && !self.mode_allows_emergency(principal, policy).await {
            return CommandOutcome::ModeDenied;
        }

        if let Some(usage) = policy.usage
            && event.args.is_empty()
        {
            self.reply(principal, Reply::text(format!("Usage: {usage}"))).await;
            return CommandOutcome::Replied;
        }

        match policy.handler {
            Handler::Help => {
                self.reply(principal, Reply::text(catalog::help_text())).await;
                CommandOutcome::Replied
            }
            Handler::Mode => {
                let mode = self.guards.modes.current();
                self.reply(principal, Reply::text(format!("Current mode: {mode}")))
                    .await;
                CommandOutcome::Replied
            }
            Handler::Lockdown => {
                self.switch_mode(
                    principal,
                    policy,
                    OperatingMode::Lockdown,
                    "Lockdown enabled. Destructive commands disabled.",
                )
                .await
            }
            Handler::Unlock => {
                self.switch_mode(
                    principal,
                    policy,
                    OperatingMode::ReadOnly,
                    "Lockdown lifted. Mode=readonly.",
                )
                .await
            }
            Handler::DisableEmergency => {
                self.switch_mode(
                    principal,
                    policy,
                    OperatingMode::ReadOnly,
                    "Emergency mode disabled. Mode=readonly.",
                )
                .await
            }
            Handler::Confirm => self.confirm(principal, &event.args).await,
            Handler::Executor if policy.destructive => {
                self.issue(principal, policy, event.args).await
            }
            Handler::Executor => {
                self.execute(principal, policy, event.args, event.upload)
                    .await
            }
        }
    }

    async fn mode_allows_emergency(&self, principal: Principal, policy: &CommandPolicy) -> bool {
        let Err(e) = self
            .guards
            .modes
            .require(policy.name, OperatingMode::Emergency)
        else {
            return true;
        };

        let current = self.guards.modes.current();
        debug!(error = %e.kind(), "Mode requirement not met");
        self.reply(
            principal,
            Reply::text(format!("Command requires {} mode", OperatingMode::Emergency)),
        )
        .await;
        self.guards.audit.write(
            principal,
            &slash(policy.name),
            AuditStatus::Deny,
            vec![AuditField::new("mode", current.to_string())],
        );
        false
    }

    async fn switch_mode(
        &self,
        principal: Principal,
        policy: &CommandPolicy,
        next: OperatingMode,
        notice: &str,
    ) -> CommandOutcome {
        self.guards.modes.set(next);
        self.reply(principal, Reply::text(notice)).await;
        self.guards
            .audit
            .write(principal, &slash(policy.name), AuditStatus::Ok, vec![]);
        CommandOutcome::Replied
    }

    async fn issue(
        &self,
        principal: Principal,
        policy: &CommandPolicy,
        args: Vec<String>,
    ) -> CommandOutcome {
        let joined = args.join(",");
        let action = self
            .guards
            .confirm
            .issue(principal, policy.name, args, policy.double_confirm);

        info!(double_confirm = action.double_confirm, "Confirmation token issued");
        self.reply(
            principal,
            Reply::text(format!(
                "Confirm with /confirm {} (ttl {}s)",
                action.token,
                self.guards.confirm.ttl().as_secs()
            )),
        )
        .await;
        self.guards.audit.write(
            principal,
            &slash(policy.name),
            AuditStatus::Pending,
            vec![
                AuditField::new("token", action.token.clone()),
                AuditField::new("args", joined),
            ],
        );

        CommandOutcome::PendingConfirmation {
            token: action.token,
        }
    }

    async fn confirm(&self, principal: Principal, args: &[String]) -> CommandOutcome {
        let Some(token) = args.first() else {
            self.reply(principal, Reply::text("Usage: /confirm <token>")).await;
            return CommandOutcome::Replied;
        };

        let action = match self.guards.confirm.consume(principal, token) {
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "Confirmation rejected");
                self.reply(principal, Reply::text(INVALID_TOKEN_NOTICE)).await;
                self.guards.audit.write(
                    principal,
                    &slash(CONFIRM_COMMAND),
                    AuditStatus::Deny,
                    vec![AuditField::new("reason", e.kind().to_string())],
                );
                return CommandOutcome::TokenRejected;
            }
        };

        if action.double_confirm {
            let joined = action.args.join(",");
            let second = self
                .guards
                .confirm
                .issue(principal, action.command.clone(), action.args, false);

            info!(command = %action.command, "First confirmation accepted");
            self.reply(
                principal,
                Reply::text(format!("Second confirmation required: /confirm {}", second.token)),
            )
            .await;
            self.guards.audit.write(
                principal,
                &slash(&action.command),
                AuditStatus::Pending,
                vec![
                    AuditField::new("token", second.token.clone()),
                    AuditField::new("args", joined),
                ],
            );
            return CommandOutcome::PendingSecondConfirmation {
                token: second.token,
            };
        }

        let Some(policy) = catalog::lookup(&action.command) else {
            error!(command = %action.command, "Confirmed token names an unknown command");
            self.reply(principal, Reply::text(UNKNOWN_COMMAND_NOTICE)).await;
            return CommandOutcome::Replied;
        };

        // The mode may have dropped since the token was issued
        if policy.requires_emergency && !self.mode_allows_emergency(principal, policy).await {
            return CommandOutcome::ModeDenied;
        }

        self.execute(principal, policy, action.args, None).await
    }

    async fn execute(
        &self,
        principal: Principal,
        policy: &CommandPolicy,
        args: Vec<String>,
        upload: Option<Upload>,
    ) -> CommandOutcome {
        let mut fields = Vec::new();
        if !args.is_empty() {
            fields.push(AuditField::new("args", args.join(",")));
        }
        if let Some(upload) = &upload {
            fields.push(AuditField::new("file", upload.file_name.clone()));
        }

        let request = ActionRequest {
            command: policy.name.to_string(),
            args,
            upload,
        };

        match self.run_isolated(request).await {
            Ok(Ok(output)) => {
                self.send_output(principal, policy, output).await;
                self.guards
                    .audit
                    .write(principal, &slash(policy.name), AuditStatus::Ok, fields);
                CommandOutcome::Executed { success: true }
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Action failed");
                let mut reply = Reply::text(e.user_message());
                if policy.sensitive {
                    reply = reply.delete_after(self.sensitive_ttl);
                }
                self.reply(principal, reply).await;
                fields.push(AuditField::new("error", e.user_message()));
                self.guards
                    .audit
                    .write(principal, &slash(policy.name), AuditStatus::Error, fields);
                CommandOutcome::Executed { success: false }
            }
            Err(fault) => {
                error!(error = %fault, "Unexpected fault while executing command");
                self.reply(
                    principal,
                    Reply::text(format!("Internal error while running /{}", policy.name)),
                )
                .await;
                fields.push(AuditField::new("fault", fault.kind().to_string()));
                self.guards
                    .audit
                    .write(principal, &slash(policy.name), AuditStatus::Error, fields);
                CommandOutcome::Faulted
            }
        }
    }

    /// Run the executor in its own task so a panic cannot unwind into the pipeline.
    async fn run_isolated(
        &self,
        request: ActionRequest,
    ) -> Result<lifeline_actions::ActionResult<ActionOutput>, PipelineError> {
        let executor = Arc::clone(&self.executor);
        let command = request.command.clone();
        tokio::spawn(async move { executor.execute(&request).await })
            .await
            .map_err(|e| {
                let reason = if e.is_panic() { "panicked" } else { "cancelled" };
                PipelineError::new(PipelineErrorKind::Fault {
                    command,
                    reason: reason.to_string(),
                })
            })
    }

    async fn send_output(&self, principal: Principal, policy: &CommandPolicy, output: ActionOutput) {
        let mut reply = Reply::text(output.text).with_attachment(output.attachment);
        if policy.sensitive {
            reply = reply.delete_after(self.sensitive_ttl);
        }
        self.reply(principal, reply).await;
    }

    /// Send a reply, scheduling its deletion when requested. Transport failures are logged only.
    async fn reply(&self, principal: Principal, reply: Reply) {
        let delete_after = reply.delete_after;
        match self.responder.send(principal, reply).await {
            Ok(message) => {
                if let Some(ttl) = delete_after {
                    self.deletions
                        .schedule(Arc::clone(&self.responder), principal, message, ttl);
                }
            }
            Err(e) => warn!(error = %e, "Failed to send reply"),
        }
    }
}

fn slash(command: &str) -> String {
    format!("/{command}")
}
