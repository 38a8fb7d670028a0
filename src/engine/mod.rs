//! Rule engine for claude-hookrules
//!
//! Evaluates a set of candidate rules against one runtime event and
//! aggregates the matches into a single [`Decision`].

pub mod event;

use crate::output::Decision;
use crate::rules::Rule;

pub use event::RuntimeEvent;

/// Stateless rule evaluator.
///
/// Callers pass only rules whose event class is compatible with the event;
/// the engine does not filter. Evaluation never mutates anything, so the same
/// inputs always give the same [`Decision`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every rule and aggregate the result
    pub fn evaluate<'r, I>(&self, rules: I, event: &RuntimeEvent) -> Decision
    where
        I: IntoIterator<Item = &'r Rule>,
    {
        let matched = self.matching(rules, event);
        Decision::from_matches(&matched)
    }

    /// All matching rules, in input order.
    ///
    /// Never stops at the first match: warning state recording needs the
    /// complete list even when an earlier rule blocks.
    pub fn matching<'r, I>(&self, rules: I, event: &RuntimeEvent) -> Vec<&'r Rule>
    where
        I: IntoIterator<Item = &'r Rule>,
    {
        let matched: Vec<&Rule> = rules.into_iter().filter(|r| r.matches(event)).collect();

        if !matched.is_empty() {
            tracing::debug!(
                event = %event.summary(),
                rules = ?matched.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
                "rules matched"
            );
        }

        matched
    }
}
