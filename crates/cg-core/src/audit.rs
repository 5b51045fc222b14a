//! Append-only JSONL audit logger for validation verdicts.
//!
//! Writes one JSON object per line to a log file, recording every allowed
//! and denied command together with the session that evaluated it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cg_policy::Verdict;

use crate::config::AuditConfig;

/// Append-only JSONL audit logger.
pub struct AuditLogger {
    writer: Option<BufWriter<File>>,
    session_id: String,
}

impl AuditLogger {
    /// Create a new audit logger that writes to the given path.
    /// Creates parent directories if they don't exist.
    pub fn new(path: &PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            session_id: generate_session_id(),
        })
    }

    /// Create a no-op logger that discards all events.
    pub fn noop() -> Self {
        Self {
            writer: None,
            session_id: generate_session_id(),
        }
    }

    /// Build a logger from the audit section of the policy file. An
    /// unwritable log file degrades to a no-op logger with a warning rather
    /// than blocking validation.
    pub fn from_config(config: &AuditConfig) -> Self {
        if !config.enabled {
            return AuditLogger::noop();
        }
        let path = config.resolve_log_path();
        match AuditLogger::new(&path) {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("warning: audit log {} unavailable: {e}", path.display());
                AuditLogger::noop()
            }
        }
    }

    /// Log a command that passed validation.
    pub fn log_allowed(&mut self, verdict: &Verdict) {
        self.write_event(serde_json::json!({
            "ts": epoch_secs(),
            "session": self.session_id,
            "type": "allowed",
            "command": verdict.command,
            "base_command": verdict.base_command,
        }));
    }

    /// Log a command that was rejected, with the phase and rule that fired.
    pub fn log_denied(&mut self, verdict: &Verdict) {
        let location = verdict.location().map(|loc| loc.as_str());
        let rule = verdict
            .block_reason
            .as_ref()
            .and_then(|reason| reason.matched_rule.as_ref());
        self.write_event(serde_json::json!({
            "ts": epoch_secs(),
            "session": self.session_id,
            "type": "denied",
            "command": verdict.command,
            "base_command": verdict.base_command,
            "location": location,
            "message": verdict.message,
            "rule": rule,
        }));
    }

    fn write_event(&mut self, value: serde_json::Value) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(line) = serde_json::to_string(&value) {
                let _ = writeln!(writer, "{line}");
                let _ = writer.flush();
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn generate_session_id() -> String {
    let pid = std::process::id();
    let ts = epoch_secs();
    format!("s{:x}", pid ^ (ts as u32))
}
