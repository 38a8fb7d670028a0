//! Integration tests for rule loading and evaluation

use std::fs;
use std::path::Path;

use claude_hookrules::rules::loader::{self, Selection};
use claude_hookrules::{
    Action, Combinator, Condition, EventClass, Field, Operator, Outcome, Rule, RuleEngine, RuntimeEvent,
};
use tempfile::TempDir;

fn write_rule(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(format!("hookify.{}.local.md", name)), text).unwrap();
}

fn bash(command: &str) -> RuntimeEvent {
    RuntimeEvent::new(EventClass::Bash).with("command", command)
}

fn file_edit(path: &str, new_string: &str) -> RuntimeEvent {
    RuntimeEvent::new(EventClass::File)
        .with("file_path", path)
        .with("new_string", new_string)
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_and_block_force_push() {
    let dir = TempDir::new().unwrap();
    write_rule(
        dir.path(),
        "no-force-push",
        "---\nname: no-force-push\nevent: bash\naction: block\npattern: push\\s+(--force|-f)\n---\nForce pushes rewrite shared history.\n",
    );

    let report = loader::load_dir(dir.path());
    assert!(report.errors.is_empty());
    assert_eq!(report.rules.len(), 1);

    let event = bash("git push --force origin main");
    let candidates = report.select(EventClass::Bash, Selection::Enabled, None);
    let decision = RuleEngine::new().evaluate(candidates, &event);
    assert_eq!(decision.outcome, Outcome::Block);
    assert_eq!(decision.message, "Force pushes rewrite shared history.");
    assert_eq!(decision.matched_rules, vec!["no-force-push"]);

    let decision = RuleEngine::new().evaluate(&report.rules, &bash("git push origin main"));
    assert!(decision.is_allow());
}

#[test]
fn test_invalid_rules_are_reported_not_loaded() {
    let dir = TempDir::new().unwrap();
    write_rule(dir.path(), "good", "---\nevent: bash\npattern: ls\n---\nlisting\n");
    write_rule(dir.path(), "bad-regex", "---\nevent: bash\npattern: \"(unclosed\"\n---\nx\n");
    write_rule(
        dir.path(),
        "bad-operator",
        "---\nevent: bash\nconditions:\n  - field: command\n    operator: fuzzy\n    pattern: x\n---\nx\n",
    );
    write_rule(dir.path(), "no-frontmatter", "just a body\n");
    fs::write(dir.path().join("README.md"), "not a rule").unwrap();

    let report = loader::load_dir(dir.path());
    assert_eq!(report.rules.len(), 1);
    assert_eq!(report.rules[0].name, "good");
    assert_eq!(report.errors.len(), 3);
}

#[test]
fn test_load_order_is_by_file_name() {
    let dir = TempDir::new().unwrap();
    write_rule(dir.path(), "b-second", "---\nevent: bash\naction: warn\n---\nsecond\n");
    write_rule(dir.path(), "a-first", "---\nevent: bash\naction: warn\n---\nfirst\n");

    let report = loader::load_dir(dir.path());
    let decision = RuleEngine::new().evaluate(&report.rules, &bash("anything"));
    assert_eq!(decision.matched_rules, vec!["a-first", "b-second"]);
    assert_eq!(decision.message, "[a-first]\nfirst\n\n[b-second]\nsecond");
}

#[test]
fn test_missing_rules_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    let report = loader::load_dir(&dir.path().join("nope"));
    assert!(report.rules.is_empty());
    assert!(report.errors.is_empty());
}

#[test]
fn test_find_rules_dir_walks_up() {
    let dir = TempDir::new().unwrap();
    let claude = dir.path().join(".claude");
    let nested = dir.path().join("src/deep");
    fs::create_dir_all(&claude).unwrap();
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(loader::find_rules_dir(&nested), claude);
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_any_combinator() {
    let rule = Rule::new("secrets", EventClass::File, Action::Warn, "looks like a secret")
        .with_condition(Condition::new(Field::NewText, Operator::Contains, "api_key").unwrap())
        .with_condition(Condition::new(Field::NewText, Operator::Contains, "password").unwrap())
        .with_combinator(Combinator::Any);
    let rules = vec![rule];
    let engine = RuleEngine::new();

    assert!(engine.evaluate(&rules, &file_edit("a.py", "PASSWORD = 'x'")).is_warn());
    assert!(engine.evaluate(&rules, &file_edit("a.py", "x = 1")).is_allow());
}

#[test]
fn test_block_wins_over_warn() {
    let rules = vec![
        Rule::new("note-rm", EventClass::Bash, Action::Warn, "rm seen")
            .with_condition(Condition::new(Field::Command, Operator::StartsWith, "rm").unwrap()),
        Rule::new("no-rm-root", EventClass::Bash, Action::Block, "Refusing to remove /")
            .with_condition(Condition::new(Field::Command, Operator::MatchesRegex, r"rm\s+-rf\s+/$").unwrap()),
    ];

    let decision = RuleEngine::new().evaluate(&rules, &bash("rm -rf /"));
    assert!(decision.is_block());
    assert_eq!(decision.message, "Refusing to remove /");
    assert_eq!(decision.matched_rules, vec!["note-rm", "no-rm-root"]);
}

#[test]
fn test_event_class_filtering() {
    let rules = vec![
        Rule::new("any-event", EventClass::All, Action::Warn, "always"),
        Rule::new("bash-only", EventClass::Bash, Action::Warn, "bash"),
    ];

    let decision = RuleEngine::new().evaluate(&rules, &file_edit("x", "y"));
    assert_eq!(decision.matched_rules, vec!["any-event"]);
}

#[test]
fn test_negated_condition() {
    let rule = Rule::new("apply-without-plan", EventClass::Bash, Action::Warn, "dry run first")
        .with_condition(Condition::new(Field::Command, Operator::StartsWith, "terraform apply").unwrap())
        .with_condition(
            Condition::new(Field::Command, Operator::Contains, "-auto-approve")
                .unwrap()
                .negated(),
        );
    let rules = vec![rule];
    let engine = RuleEngine::new();

    assert!(engine.evaluate(&rules, &bash("terraform apply")).is_warn());
    assert!(engine.evaluate(&rules, &bash("terraform apply -auto-approve")).is_allow());
}
