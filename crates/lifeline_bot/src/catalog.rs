//! Static command catalog.

use crate::event::UPLOAD_COMMAND;

/// Command that consumes confirmation tokens. Reachable in every mode.
pub const CONFIRM_COMMAND: &str = "confirm";
/// The only ordinary command accepted during lockdown.
pub const UNLOCK_COMMAND: &str = "unlock";

/// Which part of the system answers a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Reply with the help text
    Help,
    /// Report the current mode
    Mode,
    /// Switch to lockdown
    Lockdown,
    /// Leave lockdown for read-only
    Unlock,
    /// Leave emergency for read-only
    DisableEmergency,
    /// Consume a confirmation token
    Confirm,
    /// Dispatch to the action executor
    Executor,
}

/// Authorization policy for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Name without the leading slash
    pub name: &'static str,
    /// One-line description for `/help`
    pub summary: &'static str,
    /// Usage line; present when the first argument is mandatory
    pub usage: Option<&'static str>,
    /// Refused unless the bot is in emergency mode
    pub requires_emergency: bool,
    /// Needs a confirmation token before it runs
    pub destructive: bool,
    /// Needs two confirmation rounds
    pub double_confirm: bool,
    /// Reply is deleted after the sensitive-reply TTL
    pub sensitive: bool,
    /// Who answers it
    pub handler: Handler,
}

impl CommandPolicy {
    const fn informational(name: &'static str, summary: &'static str, handler: Handler) -> Self {
        Self {
            name,
            summary,
            usage: None,
            requires_emergency: false,
            destructive: false,
            double_confirm: false,
            sensitive: false,
            handler,
        }
    }

    const fn emergency(name: &'static str, summary: &'static str) -> Self {
        Self {
            requires_emergency: true,
            destructive: true,
            ..Self::informational(name, summary, Handler::Executor)
        }
    }

    const fn with_usage(self, usage: &'static str) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }

    const fn double(self) -> Self {
        Self {
            double_confirm: true,
            ..self
        }
    }
}

/// Every command the bot understands.
pub const CATALOG: &[CommandPolicy] = &[
    CommandPolicy::informational("start", "Show this help", Handler::Help),
    CommandPolicy::informational("help", "Show this help", Handler::Help),
    CommandPolicy::informational("health", "Host and service health", Handler::Executor),
    CommandPolicy::informational("status", "State of each managed service", Handler::Executor),
    CommandPolicy::informational("logs", "Last 100 log lines of a service", Handler::Executor)
        .with_usage("/logs <service>")
        .sensitive(),
    CommandPolicy::informational("ls", "List a sandbox directory", Handler::Executor),
    CommandPolicy::informational("get", "Download a sandbox file", Handler::Executor)
        .with_usage("/get <path>"),
    CommandPolicy::informational(UPLOAD_COMMAND, "Send a file to store it in the inbox", Handler::Executor),
    CommandPolicy::emergency("restart", "Restart a managed service").with_usage("/restart <service>"),
    CommandPolicy::emergency("cleanup", "Prune unused docker resources"),
    CommandPolicy::emergency("reboot", "Reboot the host").double().sensitive(),
    CommandPolicy::emergency("apply", "Move a file from the inbox to the sandbox root")
        .with_usage("/apply <filename>"),
    CommandPolicy::informational(CONFIRM_COMMAND, "Confirm a pending action", Handler::Confirm)
        .with_usage("/confirm <token>"),
    CommandPolicy::informational("mode", "Show the current mode", Handler::Mode),
    CommandPolicy::informational("lockdown", "Refuse everything but /unlock", Handler::Lockdown),
    CommandPolicy::informational(UNLOCK_COMMAND, "Leave lockdown (mode becomes readonly)", Handler::Unlock),
    CommandPolicy::informational(
        "disable-emergency",
        "Leave emergency mode (mode becomes readonly)",
        Handler::DisableEmergency,
    ),
];

/// Policy for `name`, if the command exists.
pub fn lookup(name: &str) -> Option<&'static CommandPolicy> {
    CATALOG.iter().find(|policy| policy.name == name)
}

/// Commands answered by the action executor.
pub fn executor_commands() -> impl Iterator<Item = &'static str> {
    CATALOG
        .iter()
        .filter(|policy| policy.handler == Handler::Executor)
        .map(|policy| policy.name)
}

/// Text sent for `/help` and `/start`.
pub fn help_text() -> String {
    let mut text = String::from("Lifeline commands:\n");
    for policy in CATALOG.iter().filter(|p| p.name != "start") {
        let invocation = match (policy.name, policy.usage) {
            (UPLOAD_COMMAND, _) => "(attach a file)".to_string(),
            (_, Some(usage)) => usage.to_string(),
            (name, None) => format!("/{name}"),
        };
        text.push_str(&invocation);
        text.push_str(" - ");
        text.push_str(policy.summary);
        if policy.requires_emergency {
            text.push_str(" [emergency, confirm]");
        }
        text.push('\n');
    }
    text
}
