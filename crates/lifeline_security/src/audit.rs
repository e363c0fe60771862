//! Append-only audit trail.
//!
//! Every authorization decision and every executed command is written as one
//! line:
//!
//! ```text
//! 2026-01-02T03:04:05Z user=100 cmd=/restart status=pending token=ab12cd34ef56ab78 args=docker
//! ```
//!
//! Writes are best effort. A failure to open or append to the file is reported
//! through `tracing` and never returned to the caller.

use crate::Principal;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Outcome recorded for an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AuditStatus {
    /// Command executed successfully
    Ok,
    /// Command or pipeline failed
    Error,
    /// Command refused by a gate
    Deny,
    /// Command awaiting confirmation
    Pending,
}

/// One `key=value` pair attached to an audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditField {
    /// Field name
    pub key: &'static str,
    /// Field value
    pub value: String,
}

impl AuditField {
    /// Create a field.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// A single audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Principal that sent the command
    pub principal: Principal,
    /// Command as the principal typed it, e.g. `/restart`
    pub command: String,
    /// Outcome
    pub status: AuditStatus,
    /// Extra context in insertion order
    pub fields: Vec<AuditField>,
}

impl AuditRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        principal: Principal,
        command: impl Into<String>,
        status: AuditStatus,
        fields: Vec<AuditField>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            principal,
            command: command.into(),
            status,
            fields,
        }
    }

    /// Render the record as a newline-terminated line.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} user={} cmd={} status={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.principal,
            sanitize(&self.command),
            self.status
        );
        for field in &self.fields {
            line.push(' ');
            line.push_str(field.key);
            line.push('=');
            line.push_str(&sanitize(&field.value));
        }
        line.push('\n');
        line
    }
}

/// Whitespace and control characters would break the one-event-per-line format.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect()
}

/// Serialized writer for the audit file.
#[derive(Debug)]
pub struct AuditLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a logger appending to `path`. Nothing is opened until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the audit file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event stamped with the current time.
    pub fn write(
        &self,
        principal: Principal,
        command: &str,
        status: AuditStatus,
        fields: Vec<AuditField>,
    ) {
        self.record(&AuditRecord::new(principal, command, status, fields));
    }

    /// Append a prepared record.
    ///
    /// The append is synchronous std I/O on the calling thread, held under the
    /// lock, so the record is on disk before the command it describes runs.
    /// Each call is one short `O_APPEND` write.
    pub fn record(&self, record: &AuditRecord) {
        let line = record.to_line();
        let _guard = self.lock.lock();

        if let Err(e) = self.append(&line) {
            error!(
                path = %self.path.display(),
                principal = %record.principal,
                command = %record.command,
                status = %record.status,
                error = %e,
                "Failed to write audit record"
            );
            return;
        }
        debug!(command = %record.command, status = %record.status, "Audit record written");
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o640);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let record = AuditRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            principal: Principal(100),
            command: "/restart".to_string(),
            status: AuditStatus::Pending,
            fields: vec![
                AuditField::new("token", "abcd"),
                AuditField::new("args", "docker"),
            ],
        };

        assert_eq!(
            record.to_line(),
            "2026-01-02T03:04:05Z user=100 cmd=/restart status=pending token=abcd args=docker\n"
        );
    }

    #[test]
    fn test_values_cannot_inject_lines() {
        let record = AuditRecord::new(
            Principal(1),
            "/ls",
            AuditStatus::Ok,
            vec![AuditField::new("path", "a b\nstatus=ok")],
        );
        let line = record.to_line();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with("path=a_b_status=ok\n"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AuditStatus::Ok.to_string(), "ok");
        assert_eq!(AuditStatus::Deny.to_string(), "deny");
        assert_eq!("pending".parse::<AuditStatus>().unwrap(), AuditStatus::Pending);
    }
}
