//! Scope derivation for warning state
//!
//! A scope isolates rate-limit counters: one per session by default, so
//! unrelated sessions never suppress each other's warnings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, StateError};

static SAFE_SCOPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// How the scope of a warning state is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeStrategy {
    /// Host session id; parent process id when the host sends none
    #[default]
    Session,
    /// Parent process id (per agent process)
    Ppid,
    /// Working directory hash (per project, shared by all agents)
    Cwd,
    /// Per agent process, per project
    PpidCwd,
    /// Per session, per project
    SessionCwd,
}

impl FromStr for ScopeStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "session" => Ok(ScopeStrategy::Session),
            "ppid" => Ok(ScopeStrategy::Ppid),
            "cwd" => Ok(ScopeStrategy::Cwd),
            "ppid+cwd" => Ok(ScopeStrategy::PpidCwd),
            "session+cwd" => Ok(ScopeStrategy::SessionCwd),
            other => Err(ConfigError::UnknownScope(other.to_string())),
        }
    }
}

/// Facts about the current invocation a scope can be derived from
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
    pub session_id: Option<String>,
    pub ppid: Option<u32>,
    pub cwd: Option<PathBuf>,
}

impl ScopeContext {
    /// Context of the running process
    pub fn current(session_id: Option<String>) -> Self {
        Self {
            session_id: session_id.filter(|s| !s.trim().is_empty()),
            ppid: parent_pid(),
            cwd: std::env::current_dir().ok(),
        }
    }
}

#[cfg(unix)]
fn parent_pid() -> Option<u32> {
    Some(std::os::unix::process::parent_id())
}

#[cfg(not(unix))]
fn parent_pid() -> Option<u32> {
    None
}

/// Filename-safe scope identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    /// Use `raw` verbatim when it is filename-safe, otherwise a hash of it
    pub fn new(raw: &str) -> Self {
        if SAFE_SCOPE.is_match(raw) {
            Self(raw.to_string())
        } else {
            Self(format!("h{}", &sha256_hex(raw)[..16]))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// First 12 hex chars of the SHA-256 of a directory path
pub fn cwd_hash(cwd: &std::path::Path) -> String {
    sha256_hex(&cwd.to_string_lossy())[..12].to_string()
}

impl ScopeStrategy {
    /// Derive the scope id. Fails only when a required fact is unknown.
    pub fn resolve(&self, ctx: &ScopeContext) -> Result<ScopeId, StateError> {
        let raw = match self {
            ScopeStrategy::Session => session_or_ppid(ctx)?,
            ScopeStrategy::Ppid => ppid(ctx)?,
            ScopeStrategy::Cwd => cwd(ctx)?,
            ScopeStrategy::PpidCwd => format!("{}-{}", ppid(ctx)?, cwd(ctx)?),
            ScopeStrategy::SessionCwd => format!("{}-{}", session_or_ppid(ctx)?, cwd(ctx)?),
        };
        Ok(ScopeId::new(&raw))
    }
}

fn session_or_ppid(ctx: &ScopeContext) -> Result<String, StateError> {
    match &ctx.session_id {
        Some(session) => Ok(session.clone()),
        None => ppid(ctx),
    }
}

fn ppid(ctx: &ScopeContext) -> Result<String, StateError> {
    ctx.ppid
        .map(|p| p.to_string())
        .ok_or_else(|| StateError::Scope("parent process id unavailable".to_string()))
}

fn cwd(ctx: &ScopeContext) -> Result<String, StateError> {
    ctx.cwd
        .as_deref()
        .map(cwd_hash)
        .ok_or_else(|| StateError::Scope("working directory unavailable".to_string()))
}
