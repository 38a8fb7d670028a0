//! claude-hookrules - User-authored block/warn rules for Claude Code hooks
//!
//! # Usage
//!
//! ```bash
//! # As a Claude Code hook (reads hook JSON from stdin)
//! echo '{"tool_name":"Bash","tool_input":{"command":"git push --force"}}' | claude-hookrules pre-tool-use
//!
//! # Check rules against YAML test cases
//! claude-hookrules test cases.yaml --rules-dir .claude
//! ```

use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use claude_hookrules::{
    audit::AuditLogger,
    cases,
    config::{Config, DISABLED_ENV},
    dispatch::{Dispatch, Dispatcher, HookMode},
    input::HookInput,
    output::HookResponse,
    rules::loader::{self, LoadReport},
    state::{FileBackend, ScopeContext, WarningState},
};

/// Print version information
fn print_version() {
    println!("claude-hookrules {}", env!("CARGO_PKG_VERSION"));
}

/// Print help message
fn print_help() {
    println!(
        r#"claude-hookrules - User-authored block/warn rules for Claude Code hooks

USAGE:
    claude-hookrules <MODE> [OPTIONS]
    claude-hookrules test <CASES.yaml> [OPTIONS]

MODES:
    pre-tool-use            Evaluate block rules before a tool runs
    post-tool-use           Evaluate warn rules after a tool ran (rate limited)
    stop                    Evaluate stop rules
    bridge                  Evaluate bridge-enabled rules before a tool runs
    test                    Run YAML test cases against the rules

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -c, --config PATH       Path to config file
    -r, --rules-dir DIR     Directory holding hookify.*.local.md rules
    -v, --verbose           Show every test case result

ENVIRONMENT:
    HOOKRULES_DISABLED=1    Disable all rules (still logs)
    HOOKRULES_STATE_SCOPE   session, ppid, cwd, ppid+cwd or session+cwd
    HOOKRULES_LOG           Log filter (default: warn)

USAGE AS HOOK:
    Configure in ~/.claude/settings.json:
    {{
      "hooks": {{
        "PreToolUse": [{{ "hooks": [{{ "type": "command", "command": "claude-hookrules pre-tool-use" }}] }}],
        "PostToolUse": [{{ "hooks": [{{ "type": "command", "command": "claude-hookrules post-tool-use" }}] }}],
        "Stop": [{{ "hooks": [{{ "type": "command", "command": "claude-hookrules stop" }}] }}]
      }}
    }}
"#
    );
}

enum Command {
    Hook(HookMode),
    Test(Option<PathBuf>),
}

/// Parse command line arguments
struct Args {
    help: bool,
    version: bool,
    verbose: bool,
    command: Option<Command>,
    config_path: Option<String>,
    rules_dir: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut result = Args {
            help: false,
            version: false,
            verbose: false,
            command: None,
            config_path: None,
            rules_dir: None,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => result.help = true,
                "-V" | "--version" => result.version = true,
                "-v" | "--verbose" => result.verbose = true,
                "-c" | "--config" => {
                    if i + 1 < args.len() {
                        i += 1;
                        result.config_path = Some(args[i].clone());
                    }
                }
                "-r" | "--rules-dir" => {
                    if i + 1 < args.len() {
                        i += 1;
                        result.rules_dir = Some(args[i].clone());
                    }
                }
                arg if arg.starts_with("--config=") => {
                    result.config_path = Some(arg.trim_start_matches("--config=").to_string());
                }
                arg if arg.starts_with("--rules-dir=") => {
                    result.rules_dir = Some(arg.trim_start_matches("--rules-dir=").to_string());
                }
                "test" if result.command.is_none() => {
                    let cases = args
                        .get(i + 1)
                        .filter(|a| !a.starts_with('-'))
                        .map(PathBuf::from);
                    if cases.is_some() {
                        i += 1;
                    }
                    result.command = Some(Command::Test(cases));
                }
                arg if result.command.is_none() => {
                    if let Ok(mode) = arg.parse() {
                        result.command = Some(Command::Hook(mode));
                    } else {
                        tracing::warn!(argument = arg, "unknown argument ignored");
                    }
                }
                _ => {}
            }
            i += 1;
        }

        result
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HOOKRULES_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_rules(config: &Config, override_dir: Option<&str>) -> LoadReport {
    let dir = override_dir
        .map(Config::expand_path)
        .or_else(|| config.rules_dir())
        .unwrap_or_else(|| {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            loader::find_rules_dir(&cwd)
        });

    tracing::debug!(dir = %dir.display(), "loading rules");
    let report = loader::load_dir(&dir);
    report.log_errors();
    report
}

fn is_disabled() -> bool {
    env::var(DISABLED_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Run the test-case file and return the exit code
fn run_test_cases(path: &Path, rules: &LoadReport, verbose: bool) -> i32 {
    let file = match cases::load_cases(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let report = cases::run_cases(&file.test_cases, rules);
    for result in &report.results {
        if result.passed() {
            if verbose {
                println!("PASS  {}", result.name);
            }
        } else {
            println!(
                "FAIL  {} (expected {}, got {})",
                result.name, result.expected, result.decision.outcome
            );
            if !result.decision.matched_rules.is_empty() {
                println!("      matched: {}", result.decision.matched_rules.join(", "));
            }
        }
    }

    let total = report.results.len();
    println!("\n{} passed, {} failed, {} total", report.passed(), total - report.passed(), total);

    if report.all_passed() {
        0
    } else {
        1
    }
}

fn run_hook(mode: HookMode, config: &Config, rules: &LoadReport, input: &HookInput) -> Dispatch {
    let dispatcher = Dispatcher::new(config.bridge.disabled_only);

    if mode != HookMode::PostToolUse {
        return dispatcher.dispatch::<FileBackend>(mode, input, rules, None);
    }

    let ctx = ScopeContext::current(input.session_id.clone());
    match config.scope_strategy().resolve(&ctx) {
        Ok(scope) => {
            let backend = FileBackend::new(config.state_dir());
            let mut state = WarningState::open_with_ttl(backend, scope, config.state_ttl())
                .log_and_unwrap("warning state unavailable, starting fresh");
            dispatcher.dispatch(mode, input, rules, Some(&mut state))
        }
        Err(e) => {
            tracing::warn!(error = %e, "no state scope, rate-limited warnings suppressed");
            dispatcher.dispatch::<FileBackend>(mode, input, rules, None)
        }
    }
}

fn emit(response: &HookResponse) {
    if let Some(ref out) = response.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}", out);
        let _ = handle.flush();
    }
    if let Some(ref err) = response.stderr {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "{}", err);
        let _ = handle.flush();
    }
}

fn main() {
    init_tracing();
    let args = Args::parse();

    // Handle help and version
    if args.help {
        print_help();
        return;
    }

    if args.version {
        print_version();
        return;
    }

    // Load configuration
    let config = if let Some(ref path) = args.config_path {
        Config::load_from(Path::new(path)).unwrap_or_else(|e| {
            tracing::warn!("{e}; using defaults");
            Config::default()
        })
    } else {
        Config::load()
    };

    let mode = match args.command {
        Some(Command::Hook(mode)) => mode,
        Some(Command::Test(Some(path))) => {
            let rules = load_rules(&config, args.rules_dir.as_deref());
            std::process::exit(run_test_cases(&path, &rules, args.verbose));
        }
        Some(Command::Test(None)) => {
            eprintln!("Error: test needs a cases file");
            std::process::exit(1);
        }
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    // Read JSON from stdin
    let mut input_json = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input_json) {
        tracing::warn!(error = %e, "cannot read hook input");
        return;
    }

    // Nothing to check
    if input_json.trim().is_empty() {
        return;
    }

    // A malformed payload never blocks the host
    let input = match HookInput::from_json(&input_json) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(error = %e, "cannot parse hook input, allowing");
            return;
        }
    };

    let mut logger = AuditLogger::new(config.audit_path().as_deref());
    let disabled = is_disabled();

    let dispatch = if disabled {
        let empty = LoadReport::default();
        Dispatcher::default().dispatch::<FileBackend>(mode, &input, &empty, None)
    } else {
        let rules = load_rules(&config, args.rules_dir.as_deref());
        run_hook(mode, &config, &rules, &input)
    };

    // Log the dispatch
    if let Err(e) = logger.log_dispatch(&input, &dispatch, disabled) {
        tracing::warn!(error = %e, "failed to write audit log");
    }

    emit(&dispatch.response);
    std::process::exit(dispatch.response.exit_code);
}
