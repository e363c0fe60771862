//! Identity allowlist.

use crate::Principal;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Set of principals allowed to interact with the bot.
///
/// The set only grows. Revoking a principal requires restarting the process
/// with a new configuration.
#[derive(Debug, Default)]
pub struct Allowlist {
    allowed: RwLock<HashSet<Principal>>,
}

impl Allowlist {
    /// Create an allowlist from the configured principals.
    pub fn new(principals: impl IntoIterator<Item = Principal>) -> Self {
        let allowed: HashSet<Principal> = principals.into_iter().collect();
        debug!(count = allowed.len(), "Created allowlist");
        Self {
            allowed: RwLock::new(allowed),
        }
    }

    /// Check whether a principal is allowed.
    #[instrument(level = "trace", skip(self), fields(principal = %principal))]
    pub fn contains(&self, principal: Principal) -> bool {
        self.allowed.read().contains(&principal)
    }

    /// Add a principal. Adding an existing principal is a no-op.
    #[instrument(skip(self), fields(principal = %principal))]
    pub fn add(&self, principal: Principal) {
        if self.allowed.write().insert(principal) {
            info!("Principal added to allowlist");
        }
    }

    /// Number of allowed principals.
    pub fn len(&self) -> usize {
        self.allowed.read().len()
    }

    /// Whether no principal is allowed.
    pub fn is_empty(&self) -> bool {
        self.allowed.read().is_empty()
    }
}
