//! Wiring from configuration to a running server.

use lifeline_actions::{
    ActionExecutor, FileActions, HostActionExecutor, SystemActions, TokioProcessRunner,
};
use lifeline_bot::{Guards, LifelineConfig, LifelineServer, Pipeline, Responder, TokenSweeper};
use lifeline_error::{ConfigError, LifelineResult};
use lifeline_sandbox::{INBOX_DIR, SNAPSHOTS_DIR, Sandbox};
use lifeline_security::Principal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Build the host executor, creating the sandbox directories.
///
/// # Errors
///
/// Returns error if the sandbox root cannot be prepared.
#[instrument(skip_all, fields(root = %config.sandbox.root.display()))]
pub async fn build_executor(config: &LifelineConfig) -> LifelineResult<HostActionExecutor> {
    let sandbox = Sandbox::new(&config.sandbox.root)?;
    sandbox.ensure_dir(INBOX_DIR).await?;
    sandbox.ensure_dir(SNAPSHOTS_DIR).await?;
    info!(root = %sandbox.root().display(), "Sandbox ready");

    let runner = Arc::new(TokioProcessRunner::new(config.command_timeout()));
    let system = SystemActions::new(runner, config.services.allowed.iter().cloned());
    let files = FileActions::new(Arc::new(sandbox), config.max_file_bytes())
        .with_reserved([config.audit_path()]);

    Ok(HostActionExecutor::new(system, files))
}

/// Assemble guards, pipeline and sweeper into a server.
///
/// # Errors
///
/// Returns a `ConfigError` if `executor` does not handle every executor command
/// in the catalog.
pub fn build_server(
    config: &LifelineConfig,
    executor: Arc<dyn ActionExecutor>,
    responder: Arc<dyn Responder>,
) -> LifelineResult<LifelineServer> {
    let guards = Guards::from_config(config);
    let sweeper = TokenSweeper::new(
        Arc::clone(&guards.confirm),
        Arc::clone(&guards.limiter),
        config.sweep_interval(),
    );

    info!(
        mode = %guards.modes.current(),
        principals = guards.allowlist.len(),
        audit = %guards.audit.path().display(),
        "Guards initialised"
    );

    let pipeline =
        Pipeline::new(guards, executor, responder).with_sensitive_ttl(config.sensitive_ttl());
    let unsupported = pipeline.unsupported_commands();
    if !unsupported.is_empty() {
        return Err(ConfigError::new(format!(
            "executor does not handle: {}",
            unsupported.join(", ")
        ))
        .into());
    }

    Ok(LifelineServer::new(Arc::new(pipeline)).with_sweeper(sweeper))
}

/// Principal the console acts as: `requested`, else the first allowed one.
pub fn console_principal(config: &LifelineConfig, requested: Option<i64>) -> Option<Principal> {
    let principal = requested
        .or_else(|| config.security.allowed_principals.first().copied())
        .map(Principal)?;

    if !config.security.allowed_principals.contains(&principal.id()) {
        warn!(%principal, "Console principal is not allowlisted; every command will be dropped");
    }
    Some(principal)
}
