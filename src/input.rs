//! Input parsing for Claude Code hook JSON format
//!
//! Parses the JSON payload Claude Code writes to a hook's stdin. Tool hooks
//! carry `tool_name`/`tool_input`; the stop hook carries `reason` and
//! `transcript_path` instead.

use serde::Deserialize;

/// Main input structure from Claude Code hooks
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HookInput {
    /// Name of the tool being invoked (e.g., "Bash", "Read", "Edit", "Write")
    #[serde(default)]
    pub tool_name: String,

    /// Tool-specific input parameters
    #[serde(default)]
    pub tool_input: ToolInput,

    /// Session identifier
    #[serde(default)]
    pub session_id: Option<String>,

    /// Hook event name (e.g., "PreToolUse")
    #[serde(default)]
    pub hook_event_name: Option<String>,

    /// Stop reason (stop hook)
    #[serde(default)]
    pub reason: Option<String>,

    /// Transcript location (stop hook)
    #[serde(default)]
    pub transcript_path: Option<String>,
}

/// Tool-specific input variants
#[derive(Debug, Clone)]
pub enum ToolInput {
    /// Bash command execution
    Bash { command: String },

    /// File read operation
    Read { file_path: String },

    /// File edit operation
    Edit {
        file_path: String,
        old_string: String,
        new_string: String,
    },

    /// Several edits to one file
    MultiEdit { file_path: String, edits: Vec<EditPair> },

    /// File write operation
    Write { file_path: String, content: String },

    /// Unknown tool - pass through
    Unknown { raw: serde_json::Value },
}

/// One `old_string` -> `new_string` replacement
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EditPair {
    #[serde(default)]
    pub old_string: String,
    #[serde(default)]
    pub new_string: String,
}

impl Default for ToolInput {
    fn default() -> Self {
        ToolInput::Unknown {
            raw: serde_json::Value::Null,
        }
    }
}

impl<'de> Deserialize<'de> for ToolInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Deserialize as raw JSON value first
        let value = serde_json::Value::deserialize(deserializer)?;

        let str_field = |obj: &serde_json::Map<String, serde_json::Value>, key: &str| {
            obj.get(key).and_then(|v| v.as_str()).map(String::from)
        };

        // Try to determine the type based on available fields
        if let Some(obj) = value.as_object() {
            if let Some(command) = str_field(obj, "command") {
                return Ok(ToolInput::Bash { command });
            }

            if let Some(file_path) = str_field(obj, "file_path") {
                if let Some(edits) = obj.get("edits").and_then(|v| v.as_array()) {
                    let edits = edits
                        .iter()
                        .filter_map(|e| serde_json::from_value(e.clone()).ok())
                        .collect();
                    return Ok(ToolInput::MultiEdit { file_path, edits });
                }

                if let (Some(old_string), Some(new_string)) =
                    (str_field(obj, "old_string"), str_field(obj, "new_string"))
                {
                    return Ok(ToolInput::Edit {
                        file_path,
                        old_string,
                        new_string,
                    });
                }

                if let Some(content) = str_field(obj, "content") {
                    return Ok(ToolInput::Write { file_path, content });
                }

                return Ok(ToolInput::Read { file_path });
            }
        }

        // Unknown tool format - preserve raw data
        Ok(ToolInput::Unknown { raw: value })
    }
}

impl HookInput {
    /// Parse input from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
