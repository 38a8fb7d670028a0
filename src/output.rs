//! Decisions and hook output formatting
//!
//! [`Decision`] is what the rule engine produces; [`HookOutput`] and
//! [`HookResponse`] are how the binary hands it back to Claude Code.

use serde::{Deserialize, Serialize};

use crate::rules::{Action, Rule};

/// Aggregated outcome of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Allow,
    Warn,
    Block,
}

/// Result of evaluating a rule set against one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub outcome: Outcome,

    /// Empty for allow
    pub message: String,

    /// Every matched rule, in evaluation order, whatever its action
    pub matched_rules: Vec<String>,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Allow => f.write_str("allow"),
            Outcome::Warn => f.write_str("warn"),
            Outcome::Block => f.write_str("block"),
        }
    }
}

impl Decision {
    /// Create an allow decision
    pub fn allow() -> Self {
        Self {
            outcome: Outcome::Allow,
            message: String::new(),
            matched_rules: Vec::new(),
        }
    }

    /// Aggregate matched rules.
    ///
    /// Any block wins and carries the message of the first block rule.
    /// Otherwise warnings are joined, each as `[name]\nmessage`, separated by
    /// a blank line.
    pub fn from_matches(matched: &[&Rule]) -> Self {
        if matched.is_empty() {
            return Self::allow();
        }

        let matched_rules = matched.iter().map(|r| r.name.clone()).collect();

        if let Some(block) = matched.iter().find(|r| r.action == Action::Block) {
            return Self {
                outcome: Outcome::Block,
                message: block.message.clone(),
                matched_rules,
            };
        }

        let message = matched
            .iter()
            .map(|r| r.formatted_message())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            outcome: Outcome::Warn,
            message,
            matched_rules,
        }
    }

    /// Check if this is an allow decision
    pub fn is_allow(&self) -> bool {
        self.outcome == Outcome::Allow
    }

    pub fn is_warn(&self) -> bool {
        self.outcome == Outcome::Warn
    }

    /// Check if this is a block decision
    pub fn is_block(&self) -> bool {
        self.outcome == Outcome::Block
    }
}

/// JSON written to stdout by the bridge on a warning
#[derive(Debug, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,

    /// Feedback for Claude
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "permissionDecision")]
    pub permission_decision: String,
}

impl HookOutput {
    /// Allow, with an advisory message
    pub fn allow_with_message(message: &str) -> Self {
        HookOutput {
            hook_specific_output: Some(HookSpecificOutput {
                permission_decision: "allow".to_string(),
            }),
            system_message: Some(message.to_string()),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Exit code signalling "feed stderr back to Claude"
pub const EXIT_FEEDBACK: i32 = 2;

/// Everything the binary writes for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HookResponse {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl HookResponse {
    /// Silent exit 0
    pub fn pass() -> Self {
        Self::default()
    }

    /// Message on stderr with exit 2, which the host relays to Claude
    pub fn feedback(message: impl Into<String>) -> Self {
        Self {
            exit_code: EXIT_FEEDBACK,
            stdout: None,
            stderr: Some(message.into()),
        }
    }

    /// JSON on stdout with exit 0
    pub fn json(output: &HookOutput) -> Self {
        Self {
            exit_code: 0,
            stdout: Some(output.to_json()),
            stderr: None,
        }
    }
}
