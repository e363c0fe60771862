//! External process execution with a deadline.

use async_trait::async_trait;
use lifeline_error::{ActionError, ActionErrorKind, ActionResult};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Runs host programs on behalf of the system actions.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and return its combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` when the program cannot be spawned or exits
    /// unsuccessfully, and `Timeout` when it outlives the deadline.
    async fn run(&self, program: &str, args: &[&str]) -> ActionResult<String>;
}

/// [`ProcessRunner`] backed by `tokio::process` with a fixed timeout.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    timeout: Duration,
}

impl TokioProcessRunner {
    /// Create a runner killing processes that run longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Deadline applied to each process.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    #[instrument(skip(self, args), fields(arg_count = args.len()))]
    async fn run(&self, program: &str, args: &[&str]) -> ActionResult<String> {
        debug!("Spawning host process");

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to spawn host process");
                return Err(ActionError::new(ActionErrorKind::CommandFailed {
                    program: program.to_string(),
                    output: e.to_string(),
                }));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Host process timed out");
                return Err(ActionError::new(ActionErrorKind::Timeout {
                    program: program.to_string(),
                    secs: self.timeout.as_secs(),
                }));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            warn!(status = %output.status, "Host process exited unsuccessfully");
            return Err(ActionError::new(ActionErrorKind::CommandFailed {
                program: program.to_string(),
                output: format!("{}: {}", output.status, combined.trim()),
            }));
        }

        debug!(bytes = combined.len(), "Host process finished");
        Ok(combined)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = TokioProcessRunner::new(Duration::from_secs(5));
        let out = runner.run("echo", &["lifeline"]).await.unwrap();
        assert_eq!(out.trim(), "lifeline");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let runner = TokioProcessRunner::new(Duration::from_secs(5));
        let err = runner.run("false", &[]).await.unwrap_err();
        assert!(matches!(err.kind(), ActionErrorKind::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let runner = TokioProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run("lifeline-definitely-not-installed", &[])
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ActionErrorKind::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_slow_process_times_out() {
        let runner = TokioProcessRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err.kind(), ActionErrorKind::Timeout { .. }));
    }
}
