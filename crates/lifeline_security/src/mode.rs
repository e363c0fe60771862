//! Operating-mode state machine.

use crate::{SecurityError, SecurityErrorKind, SecurityResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Process-wide operating posture.
///
/// Modes are ranked `Emergency > ReadOnly > Lockdown`. A command requiring a
/// mode is allowed when the current mode ranks at least as high.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OperatingMode {
    /// Destructive commands may be requested
    Emergency,
    /// Observation only
    ReadOnly,
    /// Everything but the unlock command is refused
    Lockdown,
}

impl OperatingMode {
    /// Position in the mode hierarchy.
    pub fn rank(&self) -> u8 {
        match self {
            OperatingMode::Emergency => 3,
            OperatingMode::ReadOnly => 2,
            OperatingMode::Lockdown => 1,
        }
    }
}

/// Holder of the current operating mode.
#[derive(Debug)]
pub struct ModeManager {
    current: RwLock<OperatingMode>,
}

impl ModeManager {
    /// Create a manager starting in `initial`.
    pub fn new(initial: OperatingMode) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Current mode.
    pub fn current(&self) -> OperatingMode {
        *self.current.read()
    }

    /// Switch to `next`. Any mode may follow any mode.
    #[instrument(skip(self), fields(next = %next))]
    pub fn set(&self, next: OperatingMode) {
        let mut current = self.current.write();
        let previous = *current;
        *current = next;
        info!(previous = %previous, "Operating mode changed");
    }

    /// Whether the current mode satisfies `required`.
    pub fn allowed(&self, required: OperatingMode) -> bool {
        self.current().rank() >= required.rank()
    }

    /// Whether the bot is locked down.
    pub fn is_lockdown(&self) -> bool {
        self.current() == OperatingMode::Lockdown
    }

    /// Fail with `ModeDenied` unless the current mode satisfies `required`.
    pub fn require(&self, command: &str, required: OperatingMode) -> SecurityResult<()> {
        let current = self.current();
        if current.rank() >= required.rank() {
            return Ok(());
        }
        Err(SecurityError::new(SecurityErrorKind::ModeDenied {
            command: command.to_string(),
            required,
            current,
        }))
    }

    /// Fail with `LockdownDenied` when locked down, unless `command` is `unlock_command`.
    pub fn check_lockdown(&self, command: &str, unlock_command: &str) -> SecurityResult<()> {
        if self.is_lockdown() && command != unlock_command {
            return Err(SecurityError::new(SecurityErrorKind::LockdownDenied {
                command: command.to_string(),
            }));
        }
        Ok(())
    }
}
