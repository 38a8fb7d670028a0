//! Normalized runtime events
//!
//! The dispatcher turns a host hook payload into a [`RuntimeEvent`]: an
//! event class plus a flat map of string fields.

use std::collections::HashMap;

use crate::rules::EventClass;

/// Well-known field keys
pub mod keys {
    pub const COMMAND: &str = "command";
    pub const FILE_PATH: &str = "file_path";
    pub const CONTENT: &str = "content";
    pub const NEW_STRING: &str = "new_string";
    pub const OLD_STRING: &str = "old_string";
    pub const TOOL_NAME: &str = "tool_name";
    pub const REASON: &str = "reason";
    pub const TRANSCRIPT_PATH: &str = "transcript_path";
}

/// One tool invocation (or stop request) as seen by the rule engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub event_class: EventClass,
    fields: HashMap<String, String>,
}

impl RuntimeEvent {
    pub fn new(event_class: EventClass) -> Self {
        Self {
            event_class,
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Field value, or `""` when the field is absent
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        let subject = match self.event_class {
            EventClass::Bash => self.get(keys::COMMAND),
            EventClass::File => self.get(keys::FILE_PATH),
            EventClass::Stop => self.get(keys::REASON),
            EventClass::All => self.get(keys::TOOL_NAME),
        };
        let subject: String = if subject.chars().count() > 100 {
            format!("{}...", subject.chars().take(100).collect::<String>())
        } else {
            subject.to_string()
        };
        format!("{}: {}", self.event_class, subject)
    }
}
