//! Data-driven rule tests
//!
//! Runs YAML test cases against a rule set without touching warning state.
//! `Bash` cases are checked against bash rules; every other tool is checked
//! against file rules.
//!
//! ```yaml
//! test_cases:
//!   - name: force push is blocked
//!     tool: Bash
//!     command: git push --force origin main
//!     expect: block
//!   - name: env edit warns
//!     tool: Edit
//!     file_path: prod/.env
//!     new_string: DEBUG=1
//!     expect: warn
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::dispatch::{runtime_event, HookMode};
use crate::engine::RuleEngine;
use crate::error::ConfigError;
use crate::input::{HookInput, ToolInput};
use crate::output::{Decision, Outcome};
use crate::rules::loader::{LoadReport, Selection};
use crate::rules::EventClass;

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_tool() -> String {
    "Bash".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CaseFile {
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// One expected outcome for one tool call
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_tool")]
    pub tool: String,

    pub command: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<String>,
    pub new_string: Option<String>,
    pub old_string: Option<String>,

    /// Raw input for other tools
    pub tool_input: Option<serde_json::Value>,

    #[serde(default)]
    pub expect: Outcome,
}

impl TestCase {
    /// Event class whose rules this case is checked against
    pub fn event_class(&self) -> EventClass {
        if self.tool == "Bash" {
            EventClass::Bash
        } else {
            EventClass::File
        }
    }

    /// The hook payload this case stands for
    pub fn to_input(&self) -> HookInput {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let tool_input = match self.tool.as_str() {
            "Bash" => ToolInput::Bash {
                command: text(&self.command),
            },
            "Read" => ToolInput::Read {
                file_path: text(&self.file_path),
            },
            "Write" => ToolInput::Write {
                file_path: text(&self.file_path),
                content: text(&self.content),
            },
            "Edit" | "MultiEdit" => ToolInput::Edit {
                file_path: text(&self.file_path),
                old_string: text(&self.old_string),
                new_string: text(&self.new_string),
            },
            _ => ToolInput::Unknown {
                raw: self.tool_input.clone().unwrap_or(serde_json::Value::Null),
            },
        };

        HookInput {
            tool_name: self.tool.clone(),
            tool_input,
            hook_event_name: Some("PreToolUse".to_string()),
            ..HookInput::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseResult {
    pub name: String,
    pub expected: Outcome,
    pub decision: Decision,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.decision.outcome == self.expected
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseReport {
    pub results: Vec<CaseResult>,
}

impl CaseReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(CaseResult::passed)
    }
}

/// Read a YAML case file
pub fn load_cases(path: &Path) -> Result<CaseFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Cases {
        path: path.to_path_buf(),
        source,
    })
}

/// Evaluate each case against the enabled rules for its event class
pub fn run_cases(cases: &[TestCase], rules: &LoadReport) -> CaseReport {
    let engine = RuleEngine::new();
    let results = cases
        .iter()
        .map(|case| {
            let mut event = runtime_event(&case.to_input(), HookMode::PreToolUse);
            event.event_class = case.event_class();
            let candidates = rules.select(event.event_class, Selection::Enabled, None);
            CaseResult {
                name: case.name.clone(),
                expected: case.expect,
                decision: engine.evaluate(candidates, &event),
            }
        })
        .collect();

    CaseReport { results }
}
