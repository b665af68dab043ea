//! Audit logging for blocked commands.
//!
//! Each session gets a JSON-lines file under `~/.cc-safety-net/logs/`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::decision::AnalysisResult;
use crate::output::{MAX_EXCERPT_CHARS, redact_secrets, truncate_chars};

const MAX_SESSION_ID_CHARS: usize = 128;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9_.-]+").expect("session id pattern is a valid regex")
});

/// An audit log entry.
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    /// Timestamp of the block.
    pub ts: DateTime<Utc>,
    /// Redacted, truncated command.
    pub command: String,
    /// Redacted, truncated segment.
    pub segment: String,
    pub reason: String,
    pub cwd: Option<String>,
}

impl AuditEntry {
    /// Create a new audit entry for a block.
    pub fn new(command: &str, result: &AnalysisResult, cwd: Option<&str>) -> Self {
        Self {
            ts: Utc::now(),
            command: excerpt(command),
            segment: excerpt(&result.segment),
            reason: result.reason.clone(),
            cwd: cwd.map(str::to_string),
        }
    }
}

fn excerpt(text: &str) -> String {
    truncate_chars(&redact_secrets(text), MAX_EXCERPT_CHARS).to_string()
}

/// A filename-safe form of a session id, or `None` when nothing usable
/// remains.
pub fn sanitize_session_id(session_id: &str) -> Option<String> {
    let raw = session_id.trim();
    if raw.is_empty() {
        return None;
    }
    let safe = UNSAFE_FILENAME_CHARS.replace_all(raw, "_");
    let safe = truncate_chars(safe.trim_matches(['.', '_', '-']), MAX_SESSION_ID_CHARS);
    if safe.is_empty() || safe == "." || safe == ".." {
        return None;
    }
    Some(safe.to_string())
}

/// Default log directory, `~/.cc-safety-net/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cc-safety-net").join("logs"))
}

/// Audit logger for writing entries to a file.
pub struct AuditLogger {
    file: File,
}

impl AuditLogger {
    /// Open or create an audit log file.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Open the log for `session_id` in `dir`, creating the directory.
    ///
    /// `Ok(None)` when the session id is unusable as a filename.
    pub fn for_session(dir: &Path, session_id: &str) -> std::io::Result<Option<Self>> {
        let Some(name) = sanitize_session_id(session_id) else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        Self::open(&dir.join(format!("{name}.jsonl"))).map(Some)
    }

    /// Write an audit entry to the log.
    pub fn log(&mut self, entry: &AuditEntry) -> std::io::Result<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()
    }
}

/// Record a block for `session_id` in the default log directory. Errors are
/// logged and otherwise ignored.
pub fn record_block(session_id: &str, command: &str, result: &AnalysisResult, cwd: Option<&str>) {
    let Some(dir) = default_log_dir() else {
        return;
    };
    let written = AuditLogger::for_session(&dir, session_id).and_then(|logger| match logger {
        Some(mut logger) => logger.log(&AuditEntry::new(command, result, cwd)),
        None => Ok(()),
    });
    if let Err(e) = written {
        tracing::debug!(error = %e, "failed to write audit log");
    }
}
