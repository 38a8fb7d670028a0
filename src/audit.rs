//! JSONL audit logging for claude-hookrules
//!
//! Records every hook dispatch to a JSONL file for later analysis.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dispatch::Dispatch;
use crate::input::HookInput;
use crate::output::Outcome;

/// Log level for audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Allowed,
    Blocked,
    Warn,
    /// Warn rules matched but every warning was rate limited
    Suppressed,
    Disabled,
}

/// An audit log entry
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    /// Timestamp of the decision
    pub timestamp: DateTime<Utc>,

    pub level: LogLevel,

    /// Hook mode (PreToolUse, PostToolUse, Stop, Bridge)
    pub hook: String,

    /// Tool that was invoked
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tool: String,

    /// Rules whose message was shown
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_rules: Vec<String>,

    /// Rules that matched but were rate limited
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed_rules: Vec<String>,

    /// Summary of the event
    pub input_summary: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Session ID (if provided)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AuditEntry {
    /// Create a new audit entry from input and dispatch result
    pub fn new(input: &HookInput, dispatch: &Dispatch, disabled: bool) -> Self {
        let level = if disabled {
            LogLevel::Disabled
        } else {
            match dispatch.decision.outcome {
                Outcome::Block => LogLevel::Blocked,
                Outcome::Warn => LogLevel::Warn,
                Outcome::Allow if !dispatch.suppressed.is_empty() => LogLevel::Suppressed,
                Outcome::Allow => LogLevel::Allowed,
            }
        };

        Self {
            timestamp: Utc::now(),
            level,
            hook: dispatch.mode.to_string(),
            tool: input.tool_name.clone(),
            matched_rules: dispatch.decision.matched_rules.clone(),
            suppressed_rules: dispatch.suppressed.clone(),
            input_summary: dispatch.event.summary(),
            message: dispatch.decision.message.clone(),
            session_id: input.session_id.clone(),
        }
    }
}

/// Audit logger
#[derive(Default)]
pub struct AuditLogger {
    writer: Option<BufWriter<File>>,
}

impl AuditLogger {
    /// Create a new audit logger; `None` or an unopenable path disables it
    pub fn new(path: Option<&Path>) -> Self {
        let writer = path.and_then(|p| {
            // Ensure parent directory exists
            if let Some(parent) = p.parent() {
                let _ = std::fs::create_dir_all(parent);
            }

            match OpenOptions::new().create(true).append(true).open(p) {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "audit log disabled");
                    None
                }
            }
        });

        Self { writer }
    }

    /// Log an audit entry
    pub fn log(&mut self, entry: &AuditEntry) -> Result<(), std::io::Error> {
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Log a dispatch
    pub fn log_dispatch(
        &mut self,
        input: &HookInput,
        dispatch: &Dispatch,
        disabled: bool,
    ) -> Result<(), std::io::Error> {
        let entry = AuditEntry::new(input, dispatch, disabled);
        self.log(&entry)
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }
}
