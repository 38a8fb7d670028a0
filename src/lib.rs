//! claude-hookrules - User-authored block/warn rules for Claude Code hooks
//!
//! Rules live as `hookify.<name>.local.md` files: YAML frontmatter describing
//! when the rule fires, and a markdown body that becomes the message.
//!
//! # Features
//!
//! - **Conditions**: field/operator/value tests combined with AND or OR
//! - **Block or warn**: blocks stop the tool call, warnings are advisory
//! - **Rate limiting**: per-scope warn counters with `warn_once`/`warn_interval`
//! - **Scoped state**: counters keyed by session, parent process or working directory
//! - **Audit logging**: JSONL log of every dispatch
//!
//! # Example
//!
//! ```
//! use claude_hookrules::{Action, Condition, EventClass, Field, Operator, Rule, RuleEngine, RuntimeEvent};
//!
//! let rule = Rule::new("no-force-push", EventClass::Bash, Action::Block, "Never force push")
//!     .with_condition(Condition::new(Field::Command, Operator::Contains, "push --force").unwrap());
//! let rules = vec![rule];
//!
//! let event = RuntimeEvent::new(EventClass::Bash).with("command", "git push --force origin main");
//! let decision = RuleEngine::new().evaluate(&rules, &event);
//!
//! assert!(decision.is_block());
//! assert_eq!(decision.message, "Never force push");
//! ```

pub mod audit;
pub mod cases;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod input;
pub mod output;
pub mod rules;
pub mod state;

// Re-exports for convenience
pub use config::Config;
pub use dispatch::{Dispatcher, HookMode};
pub use engine::{RuleEngine, RuntimeEvent};
pub use error::{BestEffort, ConfigError, RuleError, StateError};
pub use input::{HookInput, ToolInput};
pub use output::{Decision, HookOutput, HookResponse, Outcome};
pub use rules::{Action, Combinator, Condition, EventClass, Field, Operator, Rule};
pub use state::{FileBackend, MemoryBackend, WarningState};
