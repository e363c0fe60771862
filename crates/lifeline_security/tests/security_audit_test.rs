//! Tests for the audit logger.

use lifeline_security::{AuditField, AuditLogger, AuditStatus, Principal};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_creates_missing_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("deeper").join("audit.log");
    let logger = AuditLogger::new(&path);

    logger.write(Principal(100), "/health", AuditStatus::Ok, vec![]);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.ends_with(" user=100 cmd=/health status=ok\n"));
}

#[test]
fn test_appends_without_truncating() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.log");
    let logger = AuditLogger::new(&path);

    logger.write(Principal(1), "/restart", AuditStatus::Pending, vec![
        AuditField::new("token", "0011223344556677"),
    ]);
    logger.write(Principal(1), "/restart", AuditStatus::Ok, vec![]);

    // A second logger on the same file keeps appending
    AuditLogger::new(&path).write(Principal(2), "ratelimit", AuditStatus::Deny, vec![]);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("status=pending token=0011223344556677"));
    assert!(lines[1].contains("cmd=/restart status=ok"));
    assert!(lines[2].contains("user=2 cmd=ratelimit status=deny"));
}

#[test]
fn test_concurrent_writes_never_interleave() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.log");
    let logger = Arc::new(AuditLogger::new(&path));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    logger.write(Principal(i), "/status", AuditStatus::Ok, vec![
                        AuditField::new("worker", i.to_string()),
                    ]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 200);
    for line in lines {
        assert!(line.contains(" cmd=/status status=ok worker="), "malformed line: {line}");
    }
}

#[test]
fn test_unwritable_store_is_swallowed() {
    let temp_dir = TempDir::new().unwrap();
    // The audit "file" is a directory, so opening it for append fails
    let logger = AuditLogger::new(temp_dir.path());

    logger.write(Principal(1), "/health", AuditStatus::Ok, vec![]);

    assert!(temp_dir.path().is_dir());
}

#[cfg(unix)]
#[test]
fn test_file_permissions_are_restrictive() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.log");
    AuditLogger::new(&path).write(Principal(1), "/mode", AuditStatus::Ok, vec![]);

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o007, 0, "audit log must not be world accessible");
}
