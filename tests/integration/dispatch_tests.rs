//! Integration tests for hook dispatch over rule files and file-backed state

use std::fs;
use std::path::Path;

use claude_hookrules::cases;
use claude_hookrules::output::EXIT_FEEDBACK;
use claude_hookrules::rules::loader::{self, LoadReport};
use claude_hookrules::state::{ScopeId, WarningState};
use claude_hookrules::{Dispatcher, FileBackend, HookInput, HookMode, Outcome};
use tempfile::TempDir;

const NO_FORCE_PUSH: &str = r#"---
name: no-force-push
event: bash
action: block
conditions:
  - field: command
    operator: regex_match
    pattern: git\s+push\s+.*(--force|-f\b)
---
Force pushing rewrites shared history. Use --force-with-lease on your own branch instead.
"#;

const WARN_ENV_EDIT: &str = r#"---
name: warn-env-edit
event: file
action: warn
warn_interval: 2
conditions:
  - field: file_path
    operator: ends_with
    pattern: .env
---
You are editing an environment file. Keep secrets out of version control.
"#;

const TESTS_BEFORE_STOP: &str = r#"---
name: tests-before-stop
event: stop
action: block
---
Run the test suite before finishing.
"#;

const BRIDGED_RM: &str = r#"---
name: bridged-rm
enabled: false
bridge_enabled: true
event: bash
pattern: rm\s+-rf
---
Recursive delete detected.
"#;

fn rules_dir() -> (TempDir, LoadReport) {
    let dir = TempDir::new().unwrap();
    for (name, text) in [
        ("no-force-push", NO_FORCE_PUSH),
        ("warn-env-edit", WARN_ENV_EDIT),
        ("tests-before-stop", TESTS_BEFORE_STOP),
        ("bridged-rm", BRIDGED_RM),
    ] {
        fs::write(dir.path().join(format!("hookify.{}.local.md", name)), text).unwrap();
    }
    let report = loader::load_dir(dir.path());
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    (dir, report)
}

fn bash(command: &str) -> HookInput {
    HookInput::from_json(&serde_json::json!({
        "tool_name": "Bash",
        "tool_input": { "command": command },
        "session_id": "sess-1",
    })
    .to_string())
    .unwrap()
}

fn edit(path: &str) -> HookInput {
    HookInput::from_json(&serde_json::json!({
        "tool_name": "Edit",
        "tool_input": { "file_path": path, "old_string": "A=1", "new_string": "A=2" },
        "session_id": "sess-1",
    })
    .to_string())
    .unwrap()
}

fn post_tool_use(state_dir: &Path, rules: &LoadReport, input: &HookInput) -> claude_hookrules::dispatch::Dispatch {
    let mut state = WarningState::open(FileBackend::new(state_dir), ScopeId::new("sess-1")).into_value();
    Dispatcher::default().dispatch(HookMode::PostToolUse, input, rules, Some(&mut state))
}

#[test]
fn test_force_push_blocked_end_to_end() {
    let (_dir, rules) = rules_dir();

    let out = Dispatcher::default().dispatch::<FileBackend>(
        HookMode::PreToolUse,
        &bash("git push --force origin main"),
        &rules,
        None,
    );
    assert_eq!(out.decision.outcome, Outcome::Block);
    assert_eq!(out.response.exit_code, EXIT_FEEDBACK);
    assert!(out
        .response
        .stderr
        .as_deref()
        .unwrap()
        .starts_with("Force pushing rewrites shared history."));

    let out = Dispatcher::default().dispatch::<FileBackend>(
        HookMode::PreToolUse,
        &bash("git push origin feature"),
        &rules,
        None,
    );
    assert!(out.decision.is_allow());
    assert_eq!(out.response.exit_code, 0);
    assert!(out.response.stderr.is_none());
}

#[test]
fn test_env_edit_warns_every_second_match() {
    let (_dir, rules) = rules_dir();
    let state_dir = TempDir::new().unwrap();
    let input = edit("config/.env");

    let first = post_tool_use(state_dir.path(), &rules, &input);
    assert_eq!(first.response.exit_code, EXIT_FEEDBACK);
    assert!(first
        .response
        .stderr
        .as_deref()
        .unwrap()
        .starts_with("[warn-env-edit]\nYou are editing an environment file."));

    let second = post_tool_use(state_dir.path(), &rules, &input);
    assert_eq!(second.response.exit_code, 0);
    assert!(second.decision.is_allow());
    assert_eq!(second.suppressed, vec!["warn-env-edit"]);

    let third = post_tool_use(state_dir.path(), &rules, &input);
    assert_eq!(third.response.exit_code, EXIT_FEEDBACK);
}

#[test]
fn test_post_tool_use_ignores_block_rules() {
    let (_dir, rules) = rules_dir();
    let state_dir = TempDir::new().unwrap();

    let out = post_tool_use(state_dir.path(), &rules, &bash("git push -f"));
    assert!(out.decision.is_allow());
    assert!(out.suppressed.is_empty());
}

#[test]
fn test_stop_rule() {
    let (_dir, rules) = rules_dir();
    let input = HookInput::from_json(r#"{"session_id":"sess-1","reason":"task complete"}"#).unwrap();

    let out = Dispatcher::default().dispatch::<FileBackend>(HookMode::Stop, &input, &rules, None);
    assert!(out.decision.is_block());
    assert_eq!(out.decision.matched_rules, vec!["tests-before-stop"]);
    assert_eq!(out.response.stderr.as_deref(), Some("Run the test suite before finishing."));
}

#[test]
fn test_bridge_warns_with_json() {
    let (_dir, rules) = rules_dir();

    let out = Dispatcher::default().dispatch::<FileBackend>(HookMode::Bridge, &bash("rm -rf build"), &rules, None);
    assert_eq!(out.response.exit_code, 0);
    let json: serde_json::Value = serde_json::from_str(out.response.stdout.as_deref().unwrap()).unwrap();
    assert_eq!(json["hookSpecificOutput"]["permissionDecision"], "allow");
    assert_eq!(json["systemMessage"], "[bridged-rm]\nRecursive delete detected.");

    // Disabled rules are never seen by the regular hooks
    let out = Dispatcher::default().dispatch::<FileBackend>(
        HookMode::PreToolUse,
        &bash("rm -rf build"),
        &rules,
        None,
    );
    assert!(out.decision.is_allow());
}

#[test]
fn test_case_file_against_rules() {
    let (_dir, rules) = rules_dir();
    let work = TempDir::new().unwrap();
    let path = work.path().join("cases.yaml");
    fs::write(
        &path,
        r#"
test_cases:
  - name: force push blocked
    tool: Bash
    command: git push --force origin main
    expect: block
  - name: plain push allowed
    command: git push origin main
    expect: allow
  - name: env edit warns
    tool: Edit
    file_path: app/.env
    new_string: SECRET=1
    expect: warn
"#,
    )
    .unwrap();

    let file = cases::load_cases(&path).unwrap();
    let report = cases::run_cases(&file.test_cases, &rules);
    assert!(report.all_passed(), "{:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.passed(), 3);
}

#[test]
fn test_bad_case_file_is_an_error() {
    let work = TempDir::new().unwrap();
    let path = work.path().join("cases.yaml");
    fs::write(&path, "test_cases: [unclosed").unwrap();
    assert!(cases::load_cases(&path).is_err());
    assert!(cases::load_cases(&work.path().join("missing.yaml")).is_err());
}
