//! Rule model for claude-hookrules
//!
//! A [`Rule`] names an event class, an action, a set of conditions and a
//! message. Rules are normally produced by [`loader`] from rule files.

pub mod condition;
pub mod loader;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use condition::{Combinator, Condition, Field, Operator};

use crate::engine::event::RuntimeEvent;

/// Class of host event a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventClass {
    Bash,
    File,
    Stop,
    /// Matches every runtime event class
    #[default]
    All,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::Bash => "bash",
            EventClass::File => "file",
            EventClass::Stop => "stop",
            EventClass::All => "all",
        }
    }

    /// Field a shorthand `pattern:` is matched against
    pub fn default_field(&self) -> Field {
        match self {
            EventClass::Bash => Field::Command,
            EventClass::File => Field::NewText,
            EventClass::Stop | EventClass::All => Field::Content,
        }
    }
}

impl FromStr for EventClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bash" => Ok(EventClass::Bash),
            "file" => Ok(EventClass::File),
            "stop" => Ok(EventClass::Stop),
            "all" | "*" => Ok(EventClass::All),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    Block,
    #[default]
    Warn,
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" | "deny" => Ok(Action::Block),
            "warn" | "warning" => Ok(Action::Warn),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Block => f.write_str("block"),
            Action::Warn => f.write_str("warn"),
        }
    }
}

/// Effective warning rate limit of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Warn on every match
    Unlimited,
    /// Warn on the first match only
    Once,
    /// Warn on matches 1, N+1, 2N+1, ...
    Every(u32),
}

impl RateLimit {
    /// Decide from the number of matches recorded before this one
    pub fn allows(&self, warn_count: u64) -> bool {
        match *self {
            RateLimit::Unlimited => true,
            RateLimit::Once => warn_count == 0,
            RateLimit::Every(n) => warn_count % u64::from(n) == 0,
        }
    }
}

/// A named policy unit
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique name; also the key of the rule's warning counter
    pub name: String,

    pub event: EventClass,

    pub action: Action,

    /// Evaluated in order and combined by `combinator`
    pub conditions: Vec<Condition>,

    pub combinator: Combinator,

    /// Shown to the caller on match
    pub message: String,

    /// Disabled rules are skipped by normal loading
    pub enabled: bool,

    /// Lets a disabled rule run on the bridge path
    pub bridge_enabled: bool,

    pub warn_once: bool,

    /// 0 means unlimited
    pub warn_interval: u32,

    /// File the rule was loaded from
    pub source: Option<PathBuf>,
}

impl Rule {
    /// Create an enabled rule with no conditions (always matches)
    pub fn new(
        name: impl Into<String>,
        event: EventClass,
        action: Action,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            event,
            action,
            conditions: Vec::new(),
            combinator: Combinator::All,
            message: message.into(),
            enabled: true,
            bridge_enabled: false,
            warn_once: false,
            warn_interval: 0,
            source: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn with_warn_once(mut self, warn_once: bool) -> Self {
        self.warn_once = warn_once;
        self
    }

    pub fn with_warn_interval(mut self, interval: u32) -> Self {
        self.warn_interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool, bridge_enabled: bool) -> Self {
        self.enabled = enabled;
        self.bridge_enabled = bridge_enabled;
        self
    }

    /// Whether this rule is compatible with an event class
    pub fn applies_to(&self, class: EventClass) -> bool {
        self.event == EventClass::All || self.event == class
    }

    /// Evaluate the condition tree. No conditions means always match.
    pub fn matches(&self, event: &RuntimeEvent) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.combinator {
            Combinator::All => self.conditions.iter().all(|c| c.matches(event)),
            Combinator::Any => self.conditions.iter().any(|c| c.matches(event)),
        }
    }

    /// `warn_once` wins over `warn_interval` when both are set
    pub fn rate_limit(&self) -> RateLimit {
        if self.warn_once {
            RateLimit::Once
        } else if self.warn_interval > 0 {
            RateLimit::Every(self.warn_interval)
        } else {
            RateLimit::Unlimited
        }
    }

    /// Message as shown in a combined warning
    pub fn formatted_message(&self) -> String {
        format!("[{}]\n{}", self.name, self.message)
    }

    /// Neither normal nor bridge loading will ever pick this rule
    pub fn is_inert(&self) -> bool {
        !self.enabled && !self.bridge_enabled
    }
}
