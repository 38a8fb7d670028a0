//! Rate-limited warning state
//!
//! Counts rule matches per scope so `warn_once` and `warn_interval` rules can
//! suppress repeated warnings across hook invocations. Counters live in a
//! [`StateBackend`]; state older than the TTL is discarded.
//!
//! Read-increment-write is not isolated between processes. Two concurrent
//! matches in one scope can lose an increment; rate limiting is best-effort.

pub mod backend;
pub mod document;
pub mod scope;

use chrono::{DateTime, Duration, Utc};

pub use backend::{FileBackend, MemoryBackend, StateBackend, SweepReport};
pub use document::{RuleCounter, StateDocument};
pub use scope::{ScopeContext, ScopeId, ScopeStrategy};

use crate::error::BestEffort;
use crate::rules::Rule;

/// Default state lifetime
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Warning counters of one scope, bound to a backend
#[derive(Debug)]
pub struct WarningState<B: StateBackend> {
    backend: B,
    scope: ScopeId,
    ttl: Duration,
    document: StateDocument,
}

impl<B: StateBackend> WarningState<B> {
    /// Sweep stale scopes, then load this scope's state (24 hour TTL)
    pub fn open(backend: B, scope: ScopeId) -> BestEffort<Self> {
        Self::open_at(backend, scope, Duration::hours(DEFAULT_TTL_HOURS), Utc::now())
    }

    pub fn open_with_ttl(backend: B, scope: ScopeId, ttl: Duration) -> BestEffort<Self> {
        Self::open_at(backend, scope, ttl, Utc::now())
    }

    /// Open as of `now`.
    ///
    /// Missing, expired, corrupt or unreadable state all start fresh. Only
    /// the last two are reported as degraded.
    pub fn open_at(backend: B, scope: ScopeId, ttl: Duration, now: DateTime<Utc>) -> BestEffort<Self> {
        let sweep = backend.sweep(ttl, now);
        if let Some(cause) = sweep.cause() {
            tracing::warn!(error = %cause, "state sweep skipped");
        }
        let swept = sweep.into_value();
        if swept.removed > 0 {
            tracing::debug!(removed = swept.removed, failed = swept.failed, "swept stale state");
        }

        let fresh = || StateDocument::fresh(scope.as_str(), now);

        let (document, cause) = match backend.load(&scope) {
            Ok(Some(document)) if !document.is_expired(now, ttl) => (document, None),
            Ok(Some(_)) => {
                tracing::debug!(scope = %scope, "state expired, starting fresh");
                (fresh(), None)
            }
            Ok(None) => (fresh(), None),
            Err(cause) => (fresh(), Some(cause)),
        };

        let state = Self {
            backend,
            scope,
            ttl,
            document,
        };

        match cause {
            None => BestEffort::Done(state),
            Some(cause) => BestEffort::Degraded {
                value: state,
                cause,
            },
        }
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn document(&self) -> &StateDocument {
        &self.document
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Matches recorded for a rule in this scope
    pub fn warn_count(&self, rule_name: &str) -> u64 {
        self.document.warn_count(rule_name)
    }

    /// Whether the next match of `rule` should be shown.
    ///
    /// Depends only on the count before that match is recorded.
    pub fn should_warn(&self, rule: &Rule) -> bool {
        rule.rate_limit().allows(self.warn_count(&rule.name))
    }

    /// Count a match and persist.
    ///
    /// Call for every match, whether or not the warning was shown. A failed
    /// write keeps the in-memory count and comes back degraded.
    pub fn record_match(&mut self, rule: &Rule) -> BestEffort<u64> {
        self.record_match_at(rule, Utc::now())
    }

    pub fn record_match_at(&mut self, rule: &Rule, now: DateTime<Utc>) -> BestEffort<u64> {
        let count = self.document.record(&rule.name, now);
        // Keep the scope id current for documents written by older versions
        self.document
            .scope_id
            .get_or_insert_with(|| self.scope.as_str().to_string());

        match self.backend.save(&self.scope, &self.document) {
            Ok(()) => BestEffort::Done(count),
            Err(cause) => BestEffort::Degraded {
                value: count,
                cause,
            },
        }
    }

    /// Record every matched rule and keep those whose warning should show.
    ///
    /// `should_warn` is consulted before each rule's match is recorded.
    pub fn filter_and_record<'r>(&mut self, matched: &[&'r Rule]) -> Vec<&'r Rule> {
        let mut shown = Vec::with_capacity(matched.len());
        for &rule in matched {
            if self.should_warn(rule) {
                shown.push(rule);
            } else {
                tracing::debug!(rule = %rule.name, count = self.warn_count(&rule.name), "warning suppressed");
            }
            self.record_match(rule).log_and_unwrap("could not save warning state");
        }
        shown
    }
}
