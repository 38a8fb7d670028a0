//! On-disk warning state document
//!
//! ```json
//! {
//!   "created_at": "2026-10-18T09:12:44.120Z",
//!   "scope_id": "4821",
//!   "rules": {
//!     "warn-env-edit": { "warn_count": 2, "last_matched_at": "2026-10-18T09:30:01.003Z" }
//!   }
//! }
//! ```
//!
//! Reading is lenient: unknown keys are ignored, `session_id` is accepted in
//! place of `scope_id`, and timestamps without an offset are read as local
//! time. A missing or unreadable `created_at` reads as the Unix epoch, which
//! makes the document expired.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Counter for one rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounter {
    /// Matches recorded so far
    #[serde(default)]
    pub warn_count: u64,

    #[serde(
        default,
        deserialize_with = "lenient_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_matched_at: Option<DateTime<Utc>>,
}

/// Per-scope warning state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(
        default = "epoch",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: DateTime<Utc>,

    #[serde(default, alias = "session_id", skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,

    #[serde(default)]
    pub rules: BTreeMap<String, RuleCounter>,
}

impl StateDocument {
    /// Empty document created at `now`
    pub fn fresh(scope_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            scope_id: Some(scope_id.to_string()),
            rules: BTreeMap::new(),
        }
    }

    /// Older than `ttl` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }

    pub fn warn_count(&self, rule: &str) -> u64 {
        self.rules.get(rule).map(|c| c.warn_count).unwrap_or(0)
    }

    /// Count one match and return the new count
    pub fn record(&mut self, rule: &str, now: DateTime<Utc>) -> u64 {
        let counter = self.rules.entry(rule.to_string()).or_default();
        counter.warn_count = counter.warn_count.saturating_add(1);
        counter.last_matched_at = Some(now);
        counter.warn_count
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Parse RFC 3339, or a naive ISO-8601 timestamp taken as local time
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp).unwrap_or_else(epoch))
}

fn lenient_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}
