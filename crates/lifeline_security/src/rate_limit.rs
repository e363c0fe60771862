//! Per-principal rate limiting using a sliding window.

use crate::{Principal, SecurityError, SecurityErrorKind, SecurityResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Sliding window limiter keyed by principal.
///
/// Each principal keeps the timestamps of its accepted calls. A call is accepted
/// when fewer than `max_calls` timestamps fall inside the trailing window.
/// Denied calls are not recorded.
///
/// Windows of principals that stop calling are only released by [`prune`],
/// so a long-running process should call it periodically.
///
/// [`prune`]: SlidingWindowLimiter::prune
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: u32,
    window: Duration,
    windows: Mutex<HashMap<Principal, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter accepting `max_calls` per `window` for each principal.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Calls accepted per window.
    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record a call made now.
    pub fn allow(&self, principal: Principal) -> bool {
        self.allow_at(principal, Instant::now())
    }

    /// Check and record a call made at `now`.
    #[instrument(level = "debug", skip(self), fields(principal = %principal))]
    pub fn allow_at(&self, principal: Principal, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let calls = windows.entry(principal).or_default();
        self.evict(calls, now);

        if calls.len() >= self.max_calls as usize {
            debug!(calls = calls.len(), "Rate limit exceeded");
            return false;
        }

        calls.push_back(now);
        debug!(calls = calls.len(), "Rate limit check passed");
        true
    }

    /// Like [`allow`](Self::allow) but returns a typed error when denied.
    pub fn check(&self, principal: Principal) -> SecurityResult<()> {
        if self.allow(principal) {
            Ok(())
        } else {
            Err(SecurityError::new(SecurityErrorKind::RateLimited {
                principal,
                limit: self.max_calls,
                window_secs: self.window.as_secs(),
            }))
        }
    }

    /// Drop windows whose calls have all aged out. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    /// Drop windows that are empty at `now`.
    pub fn prune_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, calls| {
            self.evict(calls, now);
            !calls.is_empty()
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Pruned idle rate limit windows");
        }
        removed
    }

    /// Number of principals with a tracked window.
    pub fn tracked_principals(&self) -> usize {
        self.windows.lock().len()
    }

    // Timestamps are appended in order, so expired entries are always at the front.
    fn evict(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        let Some(window_start) = now.checked_sub(self.window) else {
            return;
        };
        while calls.front().is_some_and(|t| *t <= window_start) {
            calls.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_within_limit() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.allow_at(Principal(1), now));
        assert!(limiter.allow_at(Principal(1), now));
    }

    #[test]
    fn test_blocks_over_limit() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.allow_at(Principal(1), now));
        assert!(limiter.allow_at(Principal(1), now + Duration::from_millis(10)));
        assert!(!limiter.allow_at(Principal(1), now + Duration::from_millis(20)));
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.allow_at(Principal(1), start));
        assert!(limiter.allow_at(Principal(1), start + Duration::from_secs(30)));
        assert!(!limiter.allow_at(Principal(1), start + Duration::from_secs(59)));

        // Oldest call has left the window, the second is still counted
        assert!(limiter.allow_at(Principal(1), start + Duration::from_secs(61)));
        assert!(!limiter.allow_at(Principal(1), start + Duration::from_secs(62)));
    }

    #[test]
    fn test_denied_calls_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.allow_at(Principal(1), start));
        for i in 1..5 {
            assert!(!limiter.allow_at(Principal(1), start + Duration::from_secs(i)));
        }

        // Only the first call counted, so the window reopens 10s after it
        assert!(limiter.allow_at(Principal(1), start + Duration::from_secs(11)));
    }

    #[test]
    fn test_principals_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.allow_at(Principal(1), now));
        assert!(limiter.allow_at(Principal(2), now));
        assert!(!limiter.allow_at(Principal(1), now));
    }

    #[test]
    fn test_check_returns_rate_limited() {
        let limiter = SlidingWindowLimiter::new(0, Duration::from_secs(60));
        let err = limiter.check(Principal(5)).unwrap_err();
        assert!(matches!(
            err.kind(),
            SecurityErrorKind::RateLimited { limit: 0, window_secs: 60, .. }
        ));
    }

    #[test]
    fn test_prune_removes_idle_windows() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(5));
        let start = Instant::now();
        limiter.allow_at(Principal(1), start);
        limiter.allow_at(Principal(2), start + Duration::from_secs(4));
        assert_eq!(limiter.tracked_principals(), 2);

        assert_eq!(limiter.prune_at(start + Duration::from_secs(6)), 1);
        assert_eq!(limiter.tracked_principals(), 1);
    }
}
