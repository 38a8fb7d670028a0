//! Configuration loading for claude-hookrules
//!
//! Supports TOML configuration with embedded defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::state::{ScopeStrategy, DEFAULT_TTL_HOURS};

/// Environment variable overriding `[state] scope`
pub const SCOPE_ENV: &str = "HOOKRULES_STATE_SCOPE";

/// Environment variable disabling all rules
pub const DISABLED_ENV: &str = "HOOKRULES_DISABLED";

/// General configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding `hookify.*.local.md` rule files.
    /// When unset, the nearest `.claude` directory above the working directory.
    pub rules_dir: Option<String>,

    /// Enable audit logging
    pub audit_log: bool,

    /// Path to audit log file
    pub audit_path: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            rules_dir: None,
            audit_log: false,
            audit_path: Some("~/.claude/hookrules/audit.jsonl".to_string()),
        }
    }
}

/// Warning state configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// session, ppid, cwd, ppid+cwd or session+cwd
    pub scope: String,

    /// Directory for state files (system temp dir when unset)
    pub dir: Option<String>,

    /// Hours before state is discarded
    pub ttl_hours: i64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            scope: "session".to_string(),
            dir: None,
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

/// Bridge hook configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Only evaluate disabled-but-bridge-enabled rules.
    /// When false the bridge evaluates all enabled rules instead.
    pub disabled_only: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            disabled_only: true,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub state: StateConfig,
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load() -> Self {
        let config_paths = [
            // User-specific config
            dirs::home_dir().map(|p| p.join(".claude/hookrules/config.toml")),
            // System-wide config
            Some(PathBuf::from("/etc/claude-hookrules/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("{e}"),
                }
            }
        }

        Config::default()
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Expand ~ in path strings
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get the audit log path (expanded), if audit logging is on
    pub fn audit_path(&self) -> Option<PathBuf> {
        if !self.general.audit_log {
            return None;
        }
        self.general.audit_path.as_deref().map(Self::expand_path)
    }

    pub fn rules_dir(&self) -> Option<PathBuf> {
        self.general.rules_dir.as_deref().map(Self::expand_path)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state
            .dir
            .as_deref()
            .map(Self::expand_path)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// State TTL. Values chrono cannot represent fall back to the default.
    pub fn state_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.state.ttl_hours.max(0)).unwrap_or_else(|| {
            tracing::warn!(
                ttl_hours = self.state.ttl_hours,
                "state ttl out of range, using {DEFAULT_TTL_HOURS} hours"
            );
            chrono::Duration::hours(DEFAULT_TTL_HOURS)
        })
    }

    /// Scope strategy; `HOOKRULES_STATE_SCOPE` wins over the file.
    /// Unknown names fall back to the default with a warning.
    pub fn scope_strategy(&self) -> ScopeStrategy {
        let raw = std::env::var(SCOPE_ENV).unwrap_or_else(|_| self.state.scope.clone());
        raw.parse().unwrap_or_else(|e: ConfigError| {
            tracing::warn!("{e}");
            ScopeStrategy::default()
        })
    }
}

/// Embedded default configuration
pub const DEFAULT_CONFIG_TOML: &str = r#"
[general]
audit_log = false
audit_path = "~/.claude/hookrules/audit.jsonl"

[state]
scope = "session"
ttl_hours = 24

[bridge]
disabled_only = true
"#;
