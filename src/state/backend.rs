//! Storage backends for warning state
//!
//! [`FileBackend`] keeps one JSON file per scope in a shared directory and
//! replaces it atomically. [`MemoryBackend`] keeps documents in a map and is
//! meant for tests and embedding.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::document::StateDocument;
use super::scope::ScopeId;
use crate::error::{BestEffort, StateError};

/// File name prefix shared by state files and their temporary siblings
pub const STATE_FILE_PREFIX: &str = "claude-hookrules-state-";

/// Result of a TTL sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    /// Stale files that could not be deleted
    pub failed: usize,
}

/// Where warning state documents live
pub trait StateBackend {
    /// Load the document for a scope; `Ok(None)` when there is none yet
    fn load(&self, scope: &ScopeId) -> Result<Option<StateDocument>, StateError>;

    /// Replace the document for a scope
    fn save(&self, scope: &ScopeId, document: &StateDocument) -> Result<(), StateError>;

    /// Drop state of any scope not modified within `ttl`
    fn sweep(&self, _ttl: Duration, _now: DateTime<Utc>) -> BestEffort<SweepReport> {
        BestEffort::Done(SweepReport::default())
    }
}

impl<B: StateBackend + ?Sized> StateBackend for &B {
    fn load(&self, scope: &ScopeId) -> Result<Option<StateDocument>, StateError> {
        (**self).load(scope)
    }

    fn save(&self, scope: &ScopeId, document: &StateDocument) -> Result<(), StateError> {
        (**self).save(scope, document)
    }

    fn sweep(&self, ttl: Duration, now: DateTime<Utc>) -> BestEffort<SweepReport> {
        (**self).sweep(ttl, now)
    }
}

/// One `claude-hookrules-state-<scope>.json` file per scope
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backend in the system temp directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, scope: &ScopeId) -> PathBuf {
        self.dir.join(format!("{}{}.json", STATE_FILE_PREFIX, scope))
    }

    fn is_state_file(name: &str) -> bool {
        name.strip_prefix('.')
            .unwrap_or(name)
            .starts_with(STATE_FILE_PREFIX)
    }
}

fn io_error(path: &Path, source: io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl StateBackend for FileBackend {
    fn load(&self, scope: &ScopeId) -> Result<Option<StateDocument>, StateError> {
        let path = self.path_for(scope);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StateError::Corrupt { path, source })
    }

    /// Write to a temporary sibling, then rename it over the target.
    ///
    /// Readers see either the previous document or the new one, never a
    /// partial write. Concurrent writers race with last-writer-wins.
    fn save(&self, scope: &ScopeId, document: &StateDocument) -> Result<(), StateError> {
        let path = self.path_for(scope);
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(document)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}{}.", STATE_FILE_PREFIX, scope))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| io_error(&self.dir, e))?;
        if let Err(e) = tmp.write_all(&json) {
            return Err(io_error(tmp.path(), e));
        }
        if let Err(e) = tmp.as_file().sync_all() {
            return Err(io_error(tmp.path(), e));
        }
        tmp.persist(&path).map_err(|e| io_error(&path, e.error))?;

        Ok(())
    }

    /// Delete state files (and orphaned temp files) whose mtime is older
    /// than `ttl`. Individual failures are counted, not raised.
    fn sweep(&self, ttl: Duration, now: DateTime<Utc>) -> BestEffort<SweepReport> {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BestEffort::Done(report),
            Err(e) => {
                return BestEffort::Degraded {
                    value: report,
                    cause: io_error(&self.dir, e),
                }
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !Self::is_state_file(&name.to_string_lossy()) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(_) => continue,
            };
            if now.signed_duration_since(modified) <= ttl {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "stale state not removed");
                    report.failed += 1;
                }
            }
        }

        BestEffort::Done(report)
    }
}

/// In-process backend keyed by scope id
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, StateDocument>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a scope's document
    pub fn put(&self, scope: &ScopeId, document: StateDocument) {
        self.lock().insert(scope.as_str().to_string(), document);
    }

    pub fn get(&self, scope: &ScopeId) -> Option<StateDocument> {
        self.lock().get(scope.as_str()).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StateDocument>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self, scope: &ScopeId) -> Result<Option<StateDocument>, StateError> {
        Ok(self.get(scope))
    }

    fn save(&self, scope: &ScopeId, document: &StateDocument) -> Result<(), StateError> {
        self.put(scope, document.clone());
        Ok(())
    }

    fn sweep(&self, ttl: Duration, now: DateTime<Utc>) -> BestEffort<SweepReport> {
        let mut documents = self.lock();
        let before = documents.len();
        documents.retain(|_, doc| !doc.is_expired(now, ttl));
        BestEffort::Done(SweepReport {
            removed: before - documents.len(),
            failed: 0,
        })
    }
}
