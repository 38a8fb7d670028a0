//! Hook dispatch
//!
//! Turns a hook payload into a [`RuntimeEvent`], picks the candidate rules
//! for the hook mode, runs the engine, applies warning rate limits and
//! renders the result as a [`HookResponse`].

use std::fmt;
use std::str::FromStr;

use crate::engine::event::keys;
use crate::engine::{RuleEngine, RuntimeEvent};
use crate::input::{HookInput, ToolInput};
use crate::output::{Decision, HookOutput, HookResponse};
use crate::rules::loader::{LoadReport, Selection};
use crate::rules::{Action, EventClass, RateLimit, Rule};
use crate::state::{StateBackend, WarningState};

/// Which hook the binary is running as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// Block rules, before the tool runs
    PreToolUse,
    /// Warn rules, after the tool ran, rate limited
    PostToolUse,
    /// All stop rules
    Stop,
    /// Bridge-enabled rules, before the tool runs
    Bridge,
}

impl HookMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookMode::PreToolUse => "PreToolUse",
            HookMode::PostToolUse => "PostToolUse",
            HookMode::Stop => "Stop",
            HookMode::Bridge => "Bridge",
        }
    }
}

impl FromStr for HookMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "pretooluse" | "pre" => Ok(HookMode::PreToolUse),
            "posttooluse" | "post" => Ok(HookMode::PostToolUse),
            "stop" => Ok(HookMode::Stop),
            "bridge" => Ok(HookMode::Bridge),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event class of a host tool
pub fn event_class_for_tool(tool_name: &str) -> EventClass {
    match tool_name {
        "Bash" => EventClass::Bash,
        "Read" | "Write" | "Edit" | "MultiEdit" => EventClass::File,
        _ => EventClass::All,
    }
}

/// Normalize a hook payload
pub fn runtime_event(input: &HookInput, mode: HookMode) -> RuntimeEvent {
    let class = match mode {
        HookMode::Stop => EventClass::Stop,
        // Bridge payloads without a tool name are shell commands
        HookMode::Bridge if input.tool_name.is_empty() => EventClass::Bash,
        _ => event_class_for_tool(&input.tool_name),
    };

    let mut event = RuntimeEvent::new(class);
    if !input.tool_name.is_empty() {
        event.insert(keys::TOOL_NAME, input.tool_name.as_str());
    }

    match &input.tool_input {
        ToolInput::Bash { command } => event.insert(keys::COMMAND, command.as_str()),
        ToolInput::Read { file_path } => event.insert(keys::FILE_PATH, file_path.as_str()),
        ToolInput::Edit {
            file_path,
            old_string,
            new_string,
        } => {
            event.insert(keys::FILE_PATH, file_path.as_str());
            event.insert(keys::OLD_STRING, old_string.as_str());
            event.insert(keys::NEW_STRING, new_string.as_str());
        }
        ToolInput::MultiEdit { file_path, edits } => {
            event.insert(keys::FILE_PATH, file_path.as_str());
            let olds: Vec<&str> = edits.iter().map(|e| e.old_string.as_str()).collect();
            let news: Vec<&str> = edits.iter().map(|e| e.new_string.as_str()).collect();
            event.insert(keys::OLD_STRING, olds.join("\n"));
            event.insert(keys::NEW_STRING, news.join("\n"));
        }
        ToolInput::Write { file_path, content } => {
            event.insert(keys::FILE_PATH, file_path.as_str());
            event.insert(keys::CONTENT, content.as_str());
        }
        ToolInput::Unknown { raw } => {
            if let Some(obj) = raw.as_object() {
                for (key, value) in obj {
                    if let Some(text) = value.as_str() {
                        event.insert(key.as_str(), text);
                    }
                }
            }
        }
    }

    if let Some(reason) = &input.reason {
        event.insert(keys::REASON, reason.as_str());
    }
    if let Some(path) = &input.transcript_path {
        event.insert(keys::TRANSCRIPT_PATH, path.as_str());
    }

    event
}

/// Everything one dispatch produced
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub mode: HookMode,
    pub event: RuntimeEvent,
    /// Decision over the rules whose messages are shown
    pub decision: Decision,
    /// Matched warn rules held back by rate limiting
    pub suppressed: Vec<String>,
    pub response: HookResponse,
}

/// Runs hook modes against a loaded rule set
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    engine: RuleEngine,
    bridge_selection: Selection,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Dispatcher {
    /// `bridge_disabled_only` picks bridge-only rules for the bridge mode,
    /// otherwise the bridge evaluates enabled rules
    pub fn new(bridge_disabled_only: bool) -> Self {
        Self {
            engine: RuleEngine::new(),
            bridge_selection: if bridge_disabled_only {
                Selection::BridgeOnly
            } else {
                Selection::Enabled
            },
        }
    }

    /// Dispatch one hook payload.
    ///
    /// `state` is only used by [`HookMode::PostToolUse`]. Without it, warn
    /// rules that carry a rate limit are not shown.
    pub fn dispatch<B: StateBackend>(
        &self,
        mode: HookMode,
        input: &HookInput,
        rules: &LoadReport,
        state: Option<&mut WarningState<B>>,
    ) -> Dispatch {
        let event = runtime_event(input, mode);
        let class = event.event_class;

        let (decision, suppressed, response) = match mode {
            HookMode::PreToolUse => {
                let candidates = rules.select(class, Selection::Enabled, Some(Action::Block));
                let decision = self.engine.evaluate(candidates, &event);
                let response = if decision.is_block() {
                    HookResponse::feedback(decision.message.clone())
                } else {
                    HookResponse::pass()
                };
                (decision, Vec::new(), response)
            }
            HookMode::PostToolUse => {
                let candidates = rules.select(class, Selection::Enabled, Some(Action::Warn));
                let matched = self.engine.matching(candidates, &event);
                let shown = match state {
                    Some(state) => state.filter_and_record(&matched),
                    None => matched
                        .iter()
                        .copied()
                        .filter(|r| r.rate_limit() == RateLimit::Unlimited)
                        .collect(),
                };
                let suppressed = names_not_in(&matched, &shown);
                let decision = Decision::from_matches(&shown);
                let response = if decision.is_allow() {
                    HookResponse::pass()
                } else {
                    HookResponse::feedback(decision.message.clone())
                };
                (decision, suppressed, response)
            }
            HookMode::Stop => {
                let candidates = rules.select(class, Selection::Enabled, None);
                let decision = self.engine.evaluate(candidates, &event);
                let response = if decision.is_allow() {
                    HookResponse::pass()
                } else {
                    HookResponse::feedback(decision.message.clone())
                };
                (decision, Vec::new(), response)
            }
            HookMode::Bridge => {
                let candidates = rules.select(class, self.bridge_selection, None);
                let decision = self.engine.evaluate(candidates, &event);
                let response = if decision.is_block() {
                    HookResponse::feedback(decision.message.clone())
                } else if decision.is_warn() {
                    HookResponse::json(&HookOutput::allow_with_message(&decision.message))
                } else {
                    HookResponse::pass()
                };
                (decision, Vec::new(), response)
            }
        };

        Dispatch {
            mode,
            event,
            decision,
            suppressed,
            response,
        }
    }
}

fn names_not_in(all: &[&Rule], kept: &[&Rule]) -> Vec<String> {
    all.iter()
        .filter(|r| !kept.iter().any(|k| k.name == r.name))
        .map(|r| r.name.clone())
        .collect()
}
