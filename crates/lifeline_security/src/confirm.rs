//! Confirmation tokens for destructive commands.

use crate::{Principal, SecurityError, SecurityErrorKind, SecurityResult};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Bytes of randomness behind each token (rendered as twice as many hex chars).
const TOKEN_BYTES: usize = 8;

/// A destructive command waiting for its owner to confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Token the owner must send back
    pub token: String,
    /// Principal that requested the command
    pub owner: Principal,
    /// Command name without the leading slash
    pub command: String,
    /// Command arguments in order
    pub args: Vec<String>,
    /// Instant after which the token is void
    pub expires_at: Instant,
    /// Whether a second confirmation round is required
    pub double_confirm: bool,
}

impl PendingAction {
    /// Whether the action has expired at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Issues and consumes single-use confirmation tokens.
///
/// Consuming a token always destroys it, whether or not validation succeeds.
/// Expired tokens that are never consumed stay in memory until [`sweep`] runs.
///
/// [`sweep`]: ConfirmationManager::sweep
#[derive(Debug)]
pub struct ConfirmationManager {
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingAction>>,
}

impl ConfirmationManager {
    /// Create a manager whose tokens live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Lifetime applied to every issued token.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `command` owned by `principal`.
    pub fn issue(
        &self,
        principal: Principal,
        command: impl Into<String>,
        args: Vec<String>,
        double_confirm: bool,
    ) -> PendingAction {
        self.issue_at(principal, command, args, double_confirm, Instant::now())
    }

    /// Issue a token as if the current time were `now`.
    #[instrument(skip(self, command, args, now), fields(principal = %principal))]
    pub fn issue_at(
        &self,
        principal: Principal,
        command: impl Into<String>,
        args: Vec<String>,
        double_confirm: bool,
        now: Instant,
    ) -> PendingAction {
        let action = PendingAction {
            token: random_token(),
            owner: principal,
            command: command.into(),
            args,
            expires_at: now + self.ttl,
            double_confirm,
        };

        debug!(command = %action.command, "Issuing confirmation token");
        self.pending
            .lock()
            .insert(action.token.clone(), action.clone());
        action
    }

    /// Consume `token` on behalf of `principal`.
    pub fn consume(&self, principal: Principal, token: &str) -> SecurityResult<PendingAction> {
        self.consume_at(principal, token, Instant::now())
    }

    /// Consume `token` as if the current time were `now`.
    ///
    /// The token is removed before validation, so a failed attempt cannot be
    /// retried.
    #[instrument(skip(self, token, now), fields(principal = %principal))]
    pub fn consume_at(
        &self,
        principal: Principal,
        token: &str,
        now: Instant,
    ) -> SecurityResult<PendingAction> {
        let removed = self.pending.lock().remove(token);

        let Some(action) = removed else {
            debug!("Token not found");
            return Err(SecurityError::new(SecurityErrorKind::TokenNotFound));
        };

        if action.owner != principal {
            warn!(owner = %action.owner, "Token presented by a principal that does not own it");
            return Err(SecurityError::new(SecurityErrorKind::TokenNotOwned { principal }));
        }

        if action.is_expired_at(now) {
            debug!(command = %action.command, "Token expired");
            return Err(SecurityError::new(SecurityErrorKind::TokenExpired));
        }

        info!(command = %action.command, "Token consumed");
        Ok(action)
    }

    /// Remove every expired token. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Remove tokens expired at `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, action| !action.is_expired_at(now));
        let removed = before - pending.len();
        if removed > 0 {
            debug!(removed, "Swept expired confirmation tokens");
        }
        removed
    }

    /// Number of tokens currently stored.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether `token` is currently stored.
    pub fn contains(&self, token: &str) -> bool {
        self.pending.lock().contains_key(token)
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfirmationManager {
        ConfirmationManager::new(Duration::from_secs(60))
    }

    #[test]
    fn test_issue_stores_action() {
        let confirm = manager();
        let now = Instant::now();
        let action = confirm.issue_at(Principal(1), "restart", vec!["docker".into()], false, now);

        assert_eq!(action.token.len(), TOKEN_BYTES * 2);
        assert!(action.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(action.owner, Principal(1));
        assert_eq!(action.command, "restart");
        assert_eq!(action.args, vec!["docker".to_string()]);
        assert_eq!(action.expires_at, now + Duration::from_secs(60));
        assert!(confirm.contains(&action.token));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let confirm = manager();
        let a = confirm.issue(Principal(1), "cleanup", vec![], false);
        let b = confirm.issue(Principal(1), "cleanup", vec![], false);
        assert_ne!(a.token, b.token);
        assert_eq!(confirm.pending_count(), 2);
    }

    #[test]
    fn test_consume_is_single_use() {
        let confirm = manager();
        let action = confirm.issue(Principal(1), "cleanup", vec![], false);

        let consumed = confirm.consume(Principal(1), &action.token).unwrap();
        assert_eq!(consumed, action);

        let err = confirm.consume(Principal(1), &action.token).unwrap_err();
        assert_eq!(err.kind(), &SecurityErrorKind::TokenNotFound);
    }

    #[test]
    fn test_wrong_owner_destroys_token() {
        let confirm = manager();
        let action = confirm.issue(Principal(1), "reboot", vec![], true);

        let err = confirm.consume(Principal(2), &action.token).unwrap_err();
        assert!(matches!(err.kind(), SecurityErrorKind::TokenNotOwned { .. }));

        // The rightful owner can no longer use it either
        let err = confirm.consume(Principal(1), &action.token).unwrap_err();
        assert_eq!(err.kind(), &SecurityErrorKind::TokenNotFound);
    }

    #[test]
    fn test_expired_token_is_not_retryable() {
        let confirm = manager();
        let now = Instant::now();
        let action = confirm.issue_at(Principal(1), "apply", vec!["a.conf".into()], false, now);

        let late = now + Duration::from_secs(61);
        let err = confirm.consume_at(Principal(1), &action.token, late).unwrap_err();
        assert_eq!(err.kind(), &SecurityErrorKind::TokenExpired);

        let err = confirm.consume_at(Principal(1), &action.token, now).unwrap_err();
        assert_eq!(err.kind(), &SecurityErrorKind::TokenNotFound);
    }

    #[test]
    fn test_consume_at_exact_expiry_succeeds() {
        let confirm = manager();
        let now = Instant::now();
        let action = confirm.issue_at(Principal(1), "cleanup", vec![], false, now);
        assert!(confirm.consume_at(Principal(1), &action.token, action.expires_at).is_ok());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let confirm = manager();
        let now = Instant::now();
        let old = confirm.issue_at(Principal(1), "cleanup", vec![], false, now);
        let fresh = confirm.issue_at(
            Principal(1),
            "cleanup",
            vec![],
            false,
            now + Duration::from_secs(30),
        );

        assert_eq!(confirm.sweep_at(now + Duration::from_secs(61)), 1);
        assert!(!confirm.contains(&old.token));
        assert!(confirm.contains(&fresh.token));
    }
}
