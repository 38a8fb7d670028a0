//! Rule loading from `hookify.<name>.local.md` files
//!
//! Each file is Markdown with YAML frontmatter; the body is the message:
//!
//! ```markdown
//! ---
//! name: warn-env-edit
//! event: file
//! action: warn
//! warn_interval: 2
//! conditions:
//!   - field: file_path
//!     operator: regex_match
//!     pattern: \.env$
//! ---
//! You are editing an environment file.
//! ```
//!
//! A rule that fails validation is reported in [`LoadReport::errors`] and is
//! never evaluated.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{Action, Combinator, Condition, EventClass, Field, Operator, Rule};
use crate::error::RuleError;

const FILE_PREFIX: &str = "hookify.";
const FILE_SUFFIX: &str = ".local.md";

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default, alias = "bridgeEnabled")]
    bridge_enabled: bool,
    event: Option<String>,
    action: Option<String>,
    pattern: Option<String>,
    #[serde(default)]
    conditions: Vec<ConditionSpec>,
    #[serde(alias = "match")]
    combinator: Option<String>,
    #[serde(default)]
    warn_once: bool,
    #[serde(default)]
    warn_interval: u32,
}

#[derive(Debug, Deserialize)]
struct ConditionSpec {
    field: Option<String>,
    operator: Option<String>,
    #[serde(alias = "value")]
    pattern: Option<String>,
    #[serde(default)]
    negate: bool,
    #[serde(default)]
    case_sensitive: bool,
}

/// Which rules a dispatcher path evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Enabled rules
    Enabled,
    /// Disabled rules that opted into the bridge
    BridgeOnly,
}

impl Selection {
    pub fn includes(&self, rule: &Rule) -> bool {
        match self {
            Selection::Enabled => rule.enabled,
            Selection::BridgeOnly => !rule.enabled && rule.bridge_enabled,
        }
    }
}

/// Rules that loaded, and diagnostics for those that did not
#[derive(Debug, Default)]
pub struct LoadReport {
    pub rules: Vec<Rule>,
    pub errors: Vec<RuleError>,
}

impl LoadReport {
    /// Candidate rules for an event class, in load order
    pub fn select(
        &self,
        class: EventClass,
        selection: Selection,
        action: Option<Action>,
    ) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| selection.includes(r))
            .filter(|r| r.applies_to(class))
            .filter(|r| action.map_or(true, |a| r.action == a))
            .collect()
    }

    /// Emit every load error as a warning
    pub fn log_errors(&self) {
        for error in &self.errors {
            tracing::warn!("invalid rule skipped: {error}");
        }
    }
}

/// Split `---` delimited frontmatter from the body
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// `hookify.<name>.local.md` -> `<name>`
fn name_from_path(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    let name = file.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Parse and validate one rule document
pub fn parse_rule(text: &str, path: &Path) -> Result<Rule, RuleError> {
    let (yaml, body) = split_frontmatter(text).ok_or_else(|| RuleError::MissingFrontmatter {
        path: path.to_path_buf(),
    })?;

    let yaml = if yaml.trim().is_empty() { "{}" } else { yaml };
    let front: Frontmatter = serde_yaml::from_str(yaml).map_err(|source| RuleError::Frontmatter {
        path: path.to_path_buf(),
        source,
    })?;

    let name = front
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| name_from_path(path))
        .ok_or(RuleError::MissingName)?;

    let event = match front.event.as_deref() {
        None => EventClass::All,
        Some(raw) => raw.parse().map_err(|_| RuleError::UnknownEvent {
            rule: name.clone(),
            event: raw.to_string(),
        })?,
    };

    let action = match front.action.as_deref() {
        None => Action::Warn,
        Some(raw) => raw.parse().map_err(|_| RuleError::UnknownAction {
            rule: name.clone(),
            action: raw.to_string(),
        })?,
    };

    let combinator = match front.combinator.as_deref() {
        None => Combinator::All,
        Some(raw) => raw.parse().map_err(|_| RuleError::UnknownCombinator {
            rule: name.clone(),
            combinator: raw.to_string(),
        })?,
    };

    let mut conditions = Vec::new();
    if let Some(pattern) = &front.pattern {
        conditions.push(
            Condition::new(event.default_field(), Operator::MatchesRegex, pattern.as_str())
                .map_err(|source| RuleError::InvalidRegex {
                    rule: name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?,
        );
    }
    for spec in &front.conditions {
        conditions.push(build_condition(&name, spec)?);
    }

    Ok(Rule {
        name,
        event,
        action,
        conditions,
        combinator,
        message: body.trim().to_string(),
        enabled: front.enabled,
        bridge_enabled: front.bridge_enabled,
        warn_once: front.warn_once,
        warn_interval: front.warn_interval,
        source: Some(path.to_path_buf()),
    })
}

fn build_condition(rule: &str, spec: &ConditionSpec) -> Result<Condition, RuleError> {
    let raw_field = spec.field.as_deref().ok_or(RuleError::IncompleteCondition {
        rule: rule.to_string(),
        what: "field",
    })?;
    let field: Field = raw_field.parse().map_err(|_| RuleError::UnknownField {
        rule: rule.to_string(),
        field: raw_field.to_string(),
    })?;

    let raw_operator = spec.operator.as_deref().unwrap_or("regex_match");
    let (operator, implied_negate) =
        Operator::parse(raw_operator).ok_or_else(|| RuleError::UnknownOperator {
            rule: rule.to_string(),
            operator: raw_operator.to_string(),
        })?;

    let pattern = spec.pattern.as_deref().ok_or(RuleError::IncompleteCondition {
        rule: rule.to_string(),
        what: "pattern",
    })?;

    Condition::compile(
        field,
        operator,
        pattern,
        spec.negate != implied_negate,
        spec.case_sensitive,
    )
    .map_err(|source| RuleError::InvalidRegex {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

/// Load and validate one rule file
pub fn load_rule_file(path: &Path) -> Result<Rule, RuleError> {
    let text = fs::read_to_string(path).map_err(|source| RuleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule(&text, path)
}

/// Load every `hookify.*.local.md` file in `dir`, ordered by file name
pub fn load_dir(dir: &Path) -> LoadReport {
    let mut report = LoadReport::default();

    let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| name_from_path(p).is_some())
            .collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no rules directory");
            return report;
        }
    };
    paths.sort();

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for path in paths {
        match load_rule_file(&path) {
            Ok(rule) => {
                if let Some(first) = seen.get(&rule.name) {
                    report.errors.push(RuleError::DuplicateName {
                        rule: rule.name.clone(),
                        first: first.display().to_string(),
                    });
                    continue;
                }
                if rule.is_inert() {
                    tracing::debug!(rule = %rule.name, "rule is disabled");
                }
                seen.insert(rule.name.clone(), path);
                report.rules.push(rule);
            }
            Err(e) => report.errors.push(e),
        }
    }

    report
}

/// Nearest `.claude` directory at or above `start`, else `start/.claude`
pub fn find_rules_dir(start: &Path) -> PathBuf {
    start
        .ancestors()
        .map(|dir| dir.join(".claude"))
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| start.join(".claude"))
}
