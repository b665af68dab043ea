//! CC Safety Net - Claude Code PreToolUse hook entry point.

use cc_safety_net::analysis::{AnalysisContext, analyze};
use cc_safety_net::audit;
use cc_safety_net::config::{self, Modes};
use cc_safety_net::input::HookInput;
use cc_safety_net::output::{format_invalid_input, format_response};

use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the hook response.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("SAFETY_NET_LOG").unwrap_or_else(|_| EnvFilter::new("off")),
        )
        .init();

    if std::env::args().skip(1).any(|arg| arg == "--verify-config") {
        return verify_config();
    }

    run_hook();
    ExitCode::SUCCESS
}

/// Handle one hook invocation. Always fails open unless strict mode asks
/// otherwise.
fn run_hook() {
    let modes = Modes::from_env();

    // Read JSON from stdin
    let mut input_str = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input_str) {
        tracing::debug!(error = %e, "failed to read stdin");
        return;
    }

    let input = match HookInput::parse(&input_str) {
        Ok(input) => input,
        Err(e) => {
            if modes.strict {
                println!("{}", format_invalid_input(&e.to_string()));
            }
            return;
        }
    };

    let command = match input.bash_command() {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            if modes.strict {
                println!("{}", format_invalid_input(&e.to_string()));
            }
            return;
        }
    };

    let cwd = input.cwd.as_deref();
    let ctx = AnalysisContext::from_environment(cwd)
        .with_rules(config::load_rules(cwd.map(Path::new)))
        .with_modes(modes);

    let Some(result) = analyze(command, &ctx) else {
        return;
    };

    if let Some(session_id) = &input.session_id {
        audit::record_block(session_id, command, &result, cwd);
    }
    println!("{}", format_response(command, &result));
}

/// Check the user and project config files and report what they contain.
fn verify_config() -> ExitCode {
    println!("Safety Net Config");
    println!("═════════════════");

    let mut found = Vec::new();
    if let Some(path) = config::user_config_path().filter(|p| p.exists()) {
        found.push(("User", path));
    }
    if let Ok(cwd) = std::env::current_dir() {
        let path = config::project_config_path(&cwd);
        if path.exists() {
            found.push(("Project", path));
        }
    }

    if found.is_empty() {
        println!("\nNo config files found. Using built-in rules only.");
        return ExitCode::SUCCESS;
    }

    let mut has_errors = false;
    for (scope, path) in &found {
        match config::validate_file(path) {
            Ok(names) => {
                println!("\n✓ {scope} config: {}", path.display());
                if names.is_empty() {
                    println!("  Rules: (none)");
                } else {
                    println!("  Rules:");
                    for (i, name) in names.iter().enumerate() {
                        println!("    {}. {name}", i + 1);
                    }
                }
            }
            Err(e) => {
                has_errors = true;
                eprintln!("\n✗ {scope} config: {}", path.display());
                eprintln!("  Errors:");
                for (i, message) in e.messages().iter().enumerate() {
                    eprintln!("    {}. {message}", i + 1);
                }
            }
        }
    }

    if has_errors {
        eprintln!("\nConfig validation failed.");
        return ExitCode::FAILURE;
    }
    println!("\nAll configs valid.");
    ExitCode::SUCCESS
}
