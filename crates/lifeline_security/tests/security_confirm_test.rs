//! Tests for confirmation token semantics shared across threads.

use lifeline_security::{ConfirmationManager, Principal, SecurityErrorKind};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_double_confirm_round_trip() {
    let confirm = ConfirmationManager::new(Duration::from_secs(60));
    let first = confirm.issue(Principal(1), "reboot", vec![], true);

    let consumed = confirm.consume(Principal(1), &first.token).unwrap();
    assert!(consumed.double_confirm);

    // Caller re-issues for the second round
    let second = confirm.issue(Principal(1), consumed.command.clone(), consumed.args.clone(), false);
    assert_ne!(first.token, second.token);
    assert_eq!(second.command, "reboot");
    assert!(!second.double_confirm);

    let final_action = confirm.consume(Principal(1), &second.token).unwrap();
    assert!(!final_action.double_confirm);
    assert_eq!(confirm.pending_count(), 0);
}

#[test]
fn test_token_consumed_once_under_contention() {
    let confirm = Arc::new(ConfirmationManager::new(Duration::from_secs(60)));
    let action = confirm.issue(Principal(1), "cleanup", vec![], false);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let confirm = confirm.clone();
            let token = action.token.clone();
            std::thread::spawn(move || confirm.consume(Principal(1), &token).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
}

#[test]
fn test_sweep_runs_alongside_issue_and_consume() {
    let confirm = Arc::new(ConfirmationManager::new(Duration::from_millis(0)));
    let sweeper = {
        let confirm = confirm.clone();
        std::thread::spawn(move || {
            for _ in 0..100 {
                confirm.sweep();
            }
        })
    };

    for _ in 0..100 {
        let action = confirm.issue(Principal(3), "cleanup", vec![], false);
        let result = confirm.consume_at(Principal(3), &action.token, action.expires_at + Duration::from_millis(1));
        // Either the sweeper already removed it or consume saw it expired
        let kind = result.unwrap_err().kind().clone();
        assert!(matches!(kind, SecurityErrorKind::TokenExpired | SecurityErrorKind::TokenNotFound));
    }
    sweeper.join().unwrap();

    confirm.sweep_at(Instant::now() + Duration::from_secs(1));
    assert_eq!(confirm.pending_count(), 0);
}
