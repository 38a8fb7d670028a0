//! Single-field predicates over a runtime event
//!
//! A [`Condition`] is compiled when it is built: regex patterns are checked
//! and literal values are case-folded up front, so evaluation cannot fail.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::engine::event::{keys, RuntimeEvent};

/// The inspectable facets of a runtime event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Shell command text (bash events)
    Command,
    /// Path of the file being touched
    FilePath,
    /// Full content of a written file
    Content,
    /// Text being introduced: `new_string` for edits, `content` for writes
    NewText,
    /// Text being replaced (`old_string`)
    OldText,
    /// Host tool name (`Bash`, `Edit`, ...)
    ToolName,
    /// Stop reason
    Reason,
    /// Transcript path reported by the stop hook
    TranscriptPath,
}

impl Field {
    /// Resolve this field against an event. Absent fields read as `""`.
    pub fn resolve<'e>(&self, event: &'e RuntimeEvent) -> &'e str {
        match self {
            Field::Command => event.get(keys::COMMAND),
            Field::FilePath => event.get(keys::FILE_PATH),
            Field::Content => event.get(keys::CONTENT),
            Field::NewText => {
                let new_string = event.get(keys::NEW_STRING);
                if new_string.is_empty() {
                    event.get(keys::CONTENT)
                } else {
                    new_string
                }
            }
            Field::OldText => event.get(keys::OLD_STRING),
            Field::ToolName => event.get(keys::TOOL_NAME),
            Field::Reason => event.get(keys::REASON),
            Field::TranscriptPath => event.get(keys::TRANSCRIPT_PATH),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Command => "command",
            Field::FilePath => "file_path",
            Field::Content => "content",
            Field::NewText => "new_text",
            Field::OldText => "old_text",
            Field::ToolName => "tool_name",
            Field::Reason => "reason",
            Field::TranscriptPath => "transcript_path",
        }
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "command" => Ok(Field::Command),
            "file_path" | "path" => Ok(Field::FilePath),
            "content" => Ok(Field::Content),
            "new_text" | "new_string" => Ok(Field::NewText),
            "old_text" | "old_string" => Ok(Field::OldText),
            "tool_name" | "tool" => Ok(Field::ToolName),
            "reason" => Ok(Field::Reason),
            "transcript_path" | "transcript" => Ok(Field::TranscriptPath),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied between a field value and a condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Contains,
    MatchesRegex,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse an operator name.
    ///
    /// Returns the operator plus whether the name implies negation
    /// (`not_contains`).
    pub fn parse(s: &str) -> Option<(Operator, bool)> {
        let op = match s.to_lowercase().replace('-', "_").as_str() {
            "equals" | "eq" => (Operator::Equals, false),
            "contains" => (Operator::Contains, false),
            "not_contains" => (Operator::Contains, true),
            "regex_match" | "regex" | "matches" | "matches_regex" => (Operator::MatchesRegex, false),
            "starts_with" => (Operator::StartsWith, false),
            "ends_with" => (Operator::EndsWith, false),
            _ => return None,
        };
        Some(op)
    }
}

/// How a rule's conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    /// Every condition must hold
    #[default]
    All,
    /// At least one condition must hold
    Any,
}

impl FromStr for Combinator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "and" => Ok(Combinator::All),
            "any" | "or" => Ok(Combinator::Any),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// Literal value, already lowercased when matching case-insensitively
    Literal(String),
}

/// A single field/operator/value predicate, optionally negated
#[derive(Debug, Clone)]
pub struct Condition {
    field: Field,
    operator: Operator,
    value: String,
    negate: bool,
    case_sensitive: bool,
    matcher: Matcher,
}

impl Condition {
    /// Build a case-insensitive, non-negated condition
    pub fn new(
        field: Field,
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Self::compile(field, operator, value, false, false)
    }

    /// Build a condition, compiling its pattern
    pub fn compile(
        field: Field,
        operator: Operator,
        value: impl Into<String>,
        negate: bool,
        case_sensitive: bool,
    ) -> Result<Self, regex::Error> {
        let value = value.into();
        let matcher = match operator {
            Operator::MatchesRegex => Matcher::Regex(
                RegexBuilder::new(&value)
                    .case_insensitive(!case_sensitive)
                    .build()?,
            ),
            _ if case_sensitive => Matcher::Literal(value.clone()),
            _ => Matcher::Literal(value.to_lowercase()),
        };

        Ok(Self {
            field,
            operator,
            value,
            negate,
            case_sensitive,
            matcher,
        })
    }

    /// Invert this condition
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Evaluate against an event
    pub fn matches(&self, event: &RuntimeEvent) -> bool {
        self.test(self.field.resolve(event)) != self.negate
    }

    /// The bare predicate, before negation
    fn test(&self, actual: &str) -> bool {
        let literal = match &self.matcher {
            Matcher::Regex(re) => return re.is_match(actual),
            Matcher::Literal(literal) => literal.as_str(),
        };

        let folded;
        let actual = if self.case_sensitive {
            actual
        } else {
            folded = actual.to_lowercase();
            folded.as_str()
        };

        match self.operator {
            Operator::Equals => actual == literal,
            Operator::Contains => actual.contains(literal),
            Operator::StartsWith => actual.starts_with(literal),
            Operator::EndsWith => actual.ends_with(literal),
            Operator::MatchesRegex => false,
        }
    }
}
