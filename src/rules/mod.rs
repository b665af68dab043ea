//! Built-in detectors and custom rules for command analysis.

mod custom;
mod find;
mod git;
pub mod heuristics;
mod interpreter;
mod parallel;
mod rm;
mod shell;
mod xargs;

pub use custom::check_custom_rules;
pub use find::analyze_find;
pub use git::analyze_git;
pub use interpreter::{analyze_interpreter, analyze_script, interpreter_reads_stdin, is_interpreter};
pub(crate) use parallel::analyze_parallel;
pub use rm::{RmScope, analyze_rm, is_temp_dir};
pub use shell::{dash_c_script, has_dash_c, is_shell, shell_reads_stdin};
pub(crate) use xargs::analyze_xargs;

use std::collections::BTreeSet;

/// Command families with a dedicated detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Shell,
    Interpreter,
    Git,
    Rm,
    Find,
    Xargs,
    Parallel,
    Other,
}

impl Family {
    /// Classify a normalized command name.
    pub fn of(name: &str) -> Self {
        match name {
            "git" => Family::Git,
            "rm" => Family::Rm,
            "find" => Family::Find,
            "xargs" => Family::Xargs,
            "parallel" => Family::Parallel,
            _ if is_shell(name) => Family::Shell,
            _ if is_interpreter(name) => Family::Interpreter,
            _ => Family::Other,
        }
    }
}

/// Normalize a command token to a lowercase basename, without surrounding
/// subshell or substitution punctuation.
pub fn command_name(token: &str) -> String {
    let trimmed = token
        .trim()
        .trim_start_matches(['\\', '(', '{', '`'])
        .trim_end_matches([')', '}', '`', ';']);
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    base.to_ascii_lowercase()
}

/// Letters of the short options in `args`, up to `--`.
///
/// Reads each `-xyz` bundle until its first non-letter, so attached values
/// such as `-n3` contribute only `n`.
pub fn short_opts<S: AsRef<str>>(args: &[S]) -> BTreeSet<char> {
    let mut opts = BTreeSet::new();
    for arg in args {
        let arg = arg.as_ref();
        if arg == "--" {
            break;
        }
        if arg.starts_with("--") || arg == "-" || !arg.starts_with('-') {
            continue;
        }
        for ch in arg[1..].chars() {
            if !ch.is_ascii_alphabetic() {
                break;
            }
            opts.insert(ch);
        }
    }
    opts
}

/// Skip a leading `busybox` so its applet is at the head.
pub fn unwrap_busybox(tokens: &[String]) -> &[String] {
    match tokens.split_first() {
        Some((head, rest)) if !rest.is_empty() && command_name(head) == "busybox" => rest,
        _ => tokens,
    }
}

/// Lowercased long options in `args`, up to `--`.
pub fn long_opts<S: AsRef<str>>(args: &[S]) -> BTreeSet<String> {
    args.iter()
        .map(AsRef::as_ref)
        .take_while(|arg| *arg != "--")
        .filter(|arg| arg.starts_with("--"))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// True when `args` (the arguments of an `rm`) ask for recursive, forced
/// removal.
pub fn has_recursive_force<S: AsRef<str>>(args: &[S]) -> bool {
    let short = short_opts(args);
    let long = long_opts(args);
    let recursive = short.contains(&'r') || short.contains(&'R') || long.contains("--recursive");
    let force = short.contains(&'f') || long.contains("--force");
    recursive && force
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/usr/bin/Git"), "git");
        assert_eq!(command_name("\\rm"), "rm");
        assert_eq!(command_name("(cd"), "cd");
        assert_eq!(command_name("ls;"), "ls");
    }

    #[test]
    fn test_family() {
        assert_eq!(Family::of("git"), Family::Git);
        assert_eq!(Family::of("bash"), Family::Shell);
        assert_eq!(Family::of("python3.12"), Family::Interpreter);
        assert_eq!(Family::of("ls"), Family::Other);
    }

    #[test]
    fn test_unwrap_busybox() {
        let tokens: Vec<String> = ["busybox", "rm", "-rf", "x"].map(String::from).to_vec();
        assert_eq!(unwrap_busybox(&tokens), &tokens[1..]);
        let alone = vec!["busybox".to_string()];
        assert_eq!(unwrap_busybox(&alone), &alone[..]);
    }

    #[test]
    fn test_short_opts() {
        let opts = short_opts(&["-rf", "--force", "-n3", "-", "x", "--", "-q"]);
        assert_eq!(opts.into_iter().collect::<String>(), "fnr");
    }

    #[test]
    fn test_recursive_force() {
        assert!(has_recursive_force(&["-rf", "x"]));
        assert!(has_recursive_force(&["-R", "-f", "x"]));
        assert!(has_recursive_force(&["--recursive", "--FORCE", "x"]));
        assert!(!has_recursive_force(&["-r", "x"]));
        assert!(!has_recursive_force(&["-F", "-r", "x"]));
        assert!(!has_recursive_force(&["--", "-rf"]));
    }
}
