//! Controlled host service actions.
//!
//! Only services on the configured allowlist can be inspected or restarted.
//! `cloudflared` runs as a docker container; every other service is a systemd
//! unit, with `tailscale` accepted as an alias for `tailscaled`.

use crate::ProcessRunner;
use lifeline_error::{ActionError, ActionErrorKind, ActionResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Lines returned by the `logs` action.
pub const LOG_TAIL_LINES: usize = 100;

/// How a service is managed on the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceTarget {
    /// Docker container, by name
    Container(String),
    /// Systemd unit, including the `.service` suffix
    Unit(String),
}

impl ServiceTarget {
    /// Target for a lowercase service name.
    pub fn for_service(name: &str) -> Self {
        match name {
            "cloudflared" => ServiceTarget::Container(name.to_string()),
            "tailscale" | "tailscaled" => ServiceTarget::Unit("tailscaled.service".to_string()),
            other => ServiceTarget::Unit(format!("{other}.service")),
        }
    }
}

/// Service control limited to an allowlist.
pub struct SystemActions {
    runner: Arc<dyn ProcessRunner>,
    allowed: Vec<String>,
}

impl std::fmt::Debug for SystemActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemActions")
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

impl SystemActions {
    /// Create actions for `allowed` services, compared case-insensitively.
    pub fn new(runner: Arc<dyn ProcessRunner>, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            runner,
            allowed: allowed.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Whether `service` may be controlled.
    pub fn is_allowed(&self, service: &str) -> bool {
        let service = service.to_lowercase();
        self.allowed.iter().any(|s| *s == service)
    }

    fn target(&self, service: &str) -> ActionResult<ServiceTarget> {
        if !self.is_allowed(service) {
            warn!(service, "Refused action on service outside the allowlist");
            return Err(ActionError::new(ActionErrorKind::ServiceNotAllowed(
                service.to_string(),
            )));
        }
        Ok(ServiceTarget::for_service(&service.to_lowercase()))
    }

    /// Restart an allowlisted service.
    #[instrument(skip(self))]
    pub async fn restart(&self, service: &str) -> ActionResult<String> {
        let output = match self.target(service)? {
            ServiceTarget::Container(name) => self.runner.run("docker", &["restart", name.as_str()]).await?,
            ServiceTarget::Unit(unit) => self.runner.run("systemctl", &["restart", unit.as_str()]).await?,
        };
        info!(service, "Service restarted");
        Ok(non_empty(output, format!("Restarted {service}")))
    }

    /// Last [`LOG_TAIL_LINES`] log lines of an allowlisted service.
    #[instrument(skip(self))]
    pub async fn tail_logs(&self, service: &str) -> ActionResult<String> {
        let lines = LOG_TAIL_LINES.to_string();
        let output = match self.target(service)? {
            ServiceTarget::Container(name) => {
                self.runner
                    .run("docker", &["logs", "--tail", lines.as_str(), name.as_str()])
                    .await?
            }
            ServiceTarget::Unit(unit) => {
                self.runner
                    .run("journalctl", &["-u", unit.as_str(), "-n", lines.as_str(), "--no-pager"])
                    .await?
            }
        };
        Ok(non_empty(output, format!("No log output for {service}")))
    }

    /// Remove stopped containers, dangling images and unused networks.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> ActionResult<String> {
        let output = self.runner.run("docker", &["system", "prune", "-f"]).await?;
        info!("Docker cleanup finished");
        Ok(non_empty(output, "Cleanup finished".to_string()))
    }

    /// Reboot the host.
    #[instrument(skip(self))]
    pub async fn reboot(&self) -> ActionResult<String> {
        warn!("Rebooting host");
        let output = self.runner.run("systemctl", &["reboot"]).await?;
        Ok(non_empty(output, "Reboot requested".to_string()))
    }

    /// One `name=state` line per distinct allowlisted service.
    ///
    /// A failing check is reported inline rather than failing the whole report.
    #[instrument(skip(self))]
    pub async fn status(&self) -> String {
        let mut seen = BTreeSet::new();
        let mut lines = Vec::new();

        for service in &self.allowed {
            let target = ServiceTarget::for_service(service);
            if !seen.insert(target.clone()) {
                continue;
            }

            let result = match &target {
                ServiceTarget::Container(name) => {
                    self.runner
                        .run("docker", &["inspect", "-f", "{{.State.Status}}", name.as_str()])
                        .await
                }
                ServiceTarget::Unit(unit) => self.runner.run("systemctl", &["is-active", unit.as_str()]).await,
            };

            match result {
                Ok(state) => lines.push(format!("{}={}", service, state.trim())),
                Err(e) => lines.push(format!("{}=error:{}", service, e.user_message())),
            }
        }

        lines.join("\n")
    }
}

fn non_empty(output: String, fallback: String) -> String {
    if output.trim().is_empty() {
        fallback
    } else {
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_targets() {
        assert_eq!(
            ServiceTarget::for_service("cloudflared"),
            ServiceTarget::Container("cloudflared".to_string())
        );
        assert_eq!(
            ServiceTarget::for_service("tailscale"),
            ServiceTarget::for_service("tailscaled")
        );
        assert_eq!(
            ServiceTarget::for_service("docker"),
            ServiceTarget::Unit("docker.service".to_string())
        );
    }

    #[test]
    fn test_non_empty_fallback() {
        assert_eq!(non_empty("  \n".to_string(), "done".to_string()), "done");
        assert_eq!(non_empty("ok".to_string(), "done".to_string()), "ok");
    }
}
