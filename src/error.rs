//! Error types for claude-hookrules
//!
//! Configuration problems (bad rules, bad config files) are kept apart from
//! state-store I/O problems so callers can report them differently.

use std::path::PathBuf;

use thiserror::Error;

/// A rule definition that cannot be turned into a [`crate::rules::Rule`].
///
/// Rules carrying one of these never match anything; the loader reports them
/// next to the rules that did load.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule has no name")]
    MissingName,

    #[error("rule '{rule}': duplicate rule name (first defined in {first})")]
    DuplicateName { rule: String, first: String },

    #[error("rule '{rule}': unknown field '{field}'")]
    UnknownField { rule: String, field: String },

    #[error("rule '{rule}': unknown operator '{operator}'")]
    UnknownOperator { rule: String, operator: String },

    #[error("rule '{rule}': unknown event '{event}'")]
    UnknownEvent { rule: String, event: String },

    #[error("rule '{rule}': unknown action '{action}'")]
    UnknownAction { rule: String, action: String },

    #[error("rule '{rule}': unknown combinator '{combinator}' (expected all or any)")]
    UnknownCombinator { rule: String, combinator: String },

    #[error("rule '{rule}': condition is missing a {what}")]
    IncompleteCondition { rule: String, what: &'static str },

    #[error("rule '{rule}': invalid regex '{pattern}': {source}")]
    InvalidRegex {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{path}: missing or unterminated frontmatter")]
    MissingFrontmatter { path: PathBuf },

    #[error("{path}: invalid frontmatter: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure inside the warning state store.
///
/// None of these are fatal to a hook invocation: the store falls back to an
/// empty or unpersisted state and hands the cause back for logging.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot determine scope: {0}")]
    Scope(String),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot parse test cases {path}: {source}")]
    Cases {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown state scope '{0}' (expected session, ppid, cwd, ppid+cwd or session+cwd)")]
    UnknownScope(String),
}

/// Outcome of an operation that recovers locally instead of failing.
///
/// `Done` means the operation did what was asked. `Degraded` means a default
/// was substituted and `cause` says why; the value is still usable.
#[derive(Debug)]
pub enum BestEffort<T> {
    Done(T),
    Degraded { value: T, cause: StateError },
}

impl<T> BestEffort<T> {
    /// Take the value, discarding any degradation cause
    pub fn into_value(self) -> T {
        match self {
            BestEffort::Done(value) => value,
            BestEffort::Degraded { value, .. } => value,
        }
    }

    /// The degradation cause, if any
    pub fn cause(&self) -> Option<&StateError> {
        match self {
            BestEffort::Done(_) => None,
            BestEffort::Degraded { cause, .. } => Some(cause),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BestEffort::Degraded { .. })
    }

    /// Log the cause (if any) and take the value
    pub fn log_and_unwrap(self, context: &str) -> T {
        match self {
            BestEffort::Done(value) => value,
            BestEffort::Degraded { value, cause } => {
                tracing::warn!(error = %cause, "{context}");
                value
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BestEffort<U> {
        match self {
            BestEffort::Done(value) => BestEffort::Done(f(value)),
            BestEffort::Degraded { value, cause } => BestEffort::Degraded {
                value: f(value),
                cause,
            },
        }
    }
}
