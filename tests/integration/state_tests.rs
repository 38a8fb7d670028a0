//! Integration tests for the file-backed warning state

use std::fs;
use std::time::{Duration as StdDuration, SystemTime};

use chrono::{Duration, Utc};
use claude_hookrules::state::{
    FileBackend, ScopeContext, ScopeId, ScopeStrategy, StateBackend, StateDocument, WarningState,
};
use claude_hookrules::{Action, Condition, EventClass, Field, Operator, Rule, StateError};
use filetime::FileTime;
use tempfile::TempDir;

fn env_rule() -> Rule {
    Rule::new("warn-env-edit", EventClass::File, Action::Warn, "editing an env file")
        .with_condition(Condition::new(Field::FilePath, Operator::MatchesRegex, r"\.env$").unwrap())
        .with_warn_interval(2)
}

fn age_file(path: &std::path::Path, hours: u64) {
    let old = SystemTime::now() - StdDuration::from_secs(hours * 3600);
    filetime::set_file_mtime(path, FileTime::from_system_time(old)).unwrap();
}

#[test]
fn test_counts_persist_across_openings() {
    let dir = TempDir::new().unwrap();
    let scope = ScopeId::new("session-1");
    let rule = env_rule();

    let mut shown = Vec::new();
    for _ in 0..3 {
        let mut state = WarningState::open(FileBackend::new(dir.path()), scope.clone()).into_value();
        shown.push(state.filter_and_record(&[&rule]).len() == 1);
    }
    assert_eq!(shown, vec![true, false, true]);

    let backend = FileBackend::new(dir.path());
    let document = backend.load(&scope).unwrap().unwrap();
    assert_eq!(document.warn_count("warn-env-edit"), 3);
    assert_eq!(document.scope_id.as_deref(), Some("session-1"));
}

#[test]
fn test_scopes_are_independent() {
    let dir = TempDir::new().unwrap();
    let rule = env_rule().with_warn_once(true);

    let mut a = WarningState::open(FileBackend::new(dir.path()), ScopeId::new("a")).into_value();
    let mut b = WarningState::open(FileBackend::new(dir.path()), ScopeId::new("b")).into_value();

    assert_eq!(a.filter_and_record(&[&rule]).len(), 1);
    assert_eq!(a.filter_and_record(&[&rule]).len(), 0);
    assert_eq!(b.filter_and_record(&[&rule]).len(), 1);
}

#[test]
fn test_expired_document_resets() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    let scope = ScopeId::new("old");

    let mut document = StateDocument::fresh("old", Utc::now() - Duration::hours(25));
    document.record("warn-env-edit", Utc::now() - Duration::hours(25));
    backend.save(&scope, &document).unwrap();

    let state = WarningState::open(FileBackend::new(dir.path()), scope);
    assert!(!state.is_degraded());
    let state = state.into_value();
    assert_eq!(state.warn_count("warn-env-edit"), 0);
    assert!(Utc::now() - state.document().created_at < Duration::minutes(1));
}

#[test]
fn test_legacy_document_is_read() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    let scope = ScopeId::new("legacy");

    let created = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f");
    fs::write(
        backend.path_for(&scope),
        format!(
            r#"{{"session_id":"legacy","created_at":"{}","rules":{{"warn-env-edit":{{"warn_count":1}}}}}}"#,
            created
        ),
    )
    .unwrap();

    let state = WarningState::open(FileBackend::new(dir.path()), scope).into_value();
    assert_eq!(state.warn_count("warn-env-edit"), 1);
}

#[test]
fn test_corrupt_document_degrades_to_fresh() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    let scope = ScopeId::new("broken");
    fs::write(backend.path_for(&scope), "{ not json").unwrap();

    let state = WarningState::open(FileBackend::new(dir.path()), scope.clone());
    assert!(matches!(state.cause(), Some(StateError::Corrupt { .. })));

    let mut state = state.into_value();
    assert_eq!(state.warn_count("warn-env-edit"), 0);

    // The next save replaces the corrupt file
    assert!(!state.record_match(&env_rule()).is_degraded());
    assert_eq!(backend.load(&scope).unwrap().unwrap().warn_count("warn-env-edit"), 1);
}

#[test]
fn test_leftover_temp_file_does_not_affect_state() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    let scope = ScopeId::new("crashy");

    let mut document = StateDocument::fresh("crashy", Utc::now());
    document.record("warn-env-edit", Utc::now());
    backend.save(&scope, &document).unwrap();

    // A writer died between creating its temp file and renaming it
    fs::write(
        dir.path().join(".claude-hookrules-state-crashy.x1y2z3.tmp"),
        "{\"created_at\": \"20",
    )
    .unwrap();

    let state = WarningState::open(FileBackend::new(dir.path()), scope);
    assert!(!state.is_degraded());
    assert_eq!(state.into_value().warn_count("warn-env-edit"), 1);
}

#[test]
fn test_save_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let mut state = WarningState::open(FileBackend::new(dir.path()), ScopeId::new("tidy")).into_value();
    for _ in 0..5 {
        state.record_match(&env_rule()).into_value();
    }

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["claude-hookrules-state-tidy.json"]);
}

#[test]
fn test_sweep_removes_stale_files() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());

    let stale = ScopeId::new("stale");
    let live = ScopeId::new("live");
    backend.save(&stale, &StateDocument::fresh("stale", Utc::now())).unwrap();
    backend.save(&live, &StateDocument::fresh("live", Utc::now())).unwrap();
    let orphan = dir.path().join(".claude-hookrules-state-gone.abc.tmp");
    let unrelated = dir.path().join("notes.txt");
    fs::write(&orphan, "partial").unwrap();
    fs::write(&unrelated, "keep me").unwrap();

    age_file(&backend.path_for(&stale), 30);
    age_file(&orphan, 30);
    age_file(&unrelated, 30);

    let report = backend.sweep(Duration::hours(24), Utc::now()).into_value();
    assert_eq!(report.removed, 2);
    assert!(!backend.path_for(&stale).exists());
    assert!(!orphan.exists());
    assert!(backend.path_for(&live).exists());
    assert!(unrelated.exists());
}

#[test]
fn test_open_sweeps_other_scopes() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::new(dir.path());
    let stale = ScopeId::new("stale");
    backend.save(&stale, &StateDocument::fresh("stale", Utc::now())).unwrap();
    age_file(&backend.path_for(&stale), 48);

    let _state = WarningState::open(FileBackend::new(dir.path()), ScopeId::new("current")).into_value();
    assert!(!backend.path_for(&stale).exists());
}

#[test]
fn test_unusable_state_dir_degrades() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();

    let backend = FileBackend::new(blocker.join("state"));
    let state = WarningState::open(backend, ScopeId::new("s"));
    assert!(state.is_degraded());

    let mut state = state.into_value();
    let rule = env_rule().with_warn_once(true);

    let recorded = state.record_match(&rule);
    assert!(recorded.is_degraded());
    assert_eq!(recorded.into_value(), 1);

    // Counting continues in memory for the rest of the invocation
    assert!(!state.should_warn(&rule));
}

#[test]
fn test_scope_strategies_resolve_to_safe_ids() {
    let ctx = ScopeContext {
        session_id: Some("../../etc/passwd".to_string()),
        ppid: Some(4242),
        cwd: Some("/home/dev/project".into()),
    };

    let session = ScopeStrategy::Session.resolve(&ctx).unwrap();
    assert!(session.as_str().starts_with('h'));
    assert!(!session.as_str().contains('/'));

    assert_eq!(ScopeStrategy::Ppid.resolve(&ctx).unwrap().as_str(), "4242");

    let cwd = ScopeStrategy::Cwd.resolve(&ctx).unwrap();
    assert_eq!(cwd.as_str().len(), 12);
    assert_eq!(cwd, ScopeStrategy::Cwd.resolve(&ctx).unwrap());

    let backend = FileBackend::new("/tmp/hookrules-test");
    let path = backend.path_for(&session);
    assert_eq!(path.parent(), Some(std::path::Path::new("/tmp/hookrules-test")));
}
