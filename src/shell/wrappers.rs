//! Strip transparent wrapper commands (sudo, env, command, nice, ...).

use std::collections::BTreeMap;

use super::tokenizer::tokenize;

/// Upper bound on wrapper layers removed from one segment.
const MAX_STRIP_ITERATIONS: usize = 20;

/// A segment with its wrappers removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stripped {
    /// The wrapped command and its arguments.
    pub tokens: Vec<String>,
    /// `NAME=value` assignments seen while stripping, later ones win.
    pub env: BTreeMap<String, String>,
}

/// Remove leading assignments and wrapper commands until the real command
/// is at the head.
///
/// Examples:
/// - `sudo -u root git reset --hard` -> `git reset --hard`
/// - `FOO=1 env -i command -p rm -rf x` -> `rm -rf x`
/// - `timeout -s KILL 5 nice -n 10 make` -> `make`
pub fn strip_wrappers(tokens: &[String]) -> Stripped {
    let mut env = BTreeMap::new();
    let mut current = tokens.to_vec();

    for _ in 0..MAX_STRIP_ITERATIONS {
        let next = strip_once(&current, &mut env);
        if next == current {
            break;
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    Stripped {
        tokens: current,
        env,
    }
}

fn strip_once(tokens: &[String], env: &mut BTreeMap<String, String>) -> Vec<String> {
    let mut i = 0;
    while let Some((name, value)) = tokens.get(i).and_then(|t| parse_assignment(t)) {
        env.insert(name.to_string(), value.to_string());
        i += 1;
    }
    // Anything else that looks like an assignment cannot be the command.
    while tokens.get(i).is_some_and(|t| t.contains('=')) {
        i += 1;
    }

    let Some(head) = tokens.get(i) else {
        return Vec::new();
    };
    let rest = &tokens[i + 1..];

    let skip = match command_basename(head).to_ascii_lowercase().as_str() {
        "sudo" => skip_options(rest, SUDO_VALUE_OPTIONS),
        "doas" => skip_options(rest, &["-u", "-C"]),
        "nohup" => skip_options(rest, &[]),
        "nice" => skip_options(rest, &["-n", "--adjustment"]),
        "ionice" => skip_options(rest, &["-c", "-n", "-p", "--class", "--classdata"]),
        "time" => skip_options(rest, &["-f", "-o", "--format", "--output"]),
        "timeout" => {
            let skip = skip_options(rest, &["-s", "-k", "--signal", "--kill-after"]);
            // The duration comes before the command.
            (skip + 1).min(rest.len())
        }
        "command" => skip_command_options(rest),
        "env" => return strip_env(rest, env),
        _ => return tokens[i..].to_vec(),
    };
    rest[skip..].to_vec()
}

const SUDO_VALUE_OPTIONS: &[&str] = &[
    "-u",
    "-g",
    "-C",
    "-D",
    "-h",
    "-p",
    "-r",
    "-t",
    "-T",
    "-U",
    "--user",
    "--group",
    "--close-from",
    "--chdir",
    "--host",
    "--prompt",
    "--role",
    "--type",
    "--command-timeout",
    "--other-user",
];

/// Number of leading option tokens in `args`.
///
/// Options listed in `with_value` consume the following token; `--` ends the
/// options and is itself skipped.
fn skip_options(args: &[String], with_value: &[&str]) -> usize {
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        if arg == "--" {
            return i + 1;
        }
        if !arg.starts_with('-') || arg == "-" {
            break;
        }
        if with_value.contains(&arg.as_str()) {
            i += 2;
        } else {
            i += 1;
        }
    }
    i.min(args.len())
}

fn skip_command_options(args: &[String]) -> usize {
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        if arg == "--" {
            return i + 1;
        }
        let is_flag_bundle = arg.len() > 1
            && arg.starts_with('-')
            && arg[1..].chars().all(|c| matches!(c, 'p' | 'v' | 'V'));
        if !is_flag_bundle {
            break;
        }
        i += 1;
    }
    i
}

/// Consume `env` options and assignments, splicing `-S` strings in place.
fn strip_env(args: &[String], env: &mut BTreeMap<String, String>) -> Vec<String> {
    let mut args = args.to_vec();
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        let arg = arg.clone();
        if arg == "--" {
            i += 1;
            break;
        }
        if let Some((name, value)) = parse_assignment(&arg) {
            env.insert(name.to_string(), value.to_string());
            i += 1;
            continue;
        }
        if !arg.starts_with('-') || arg == "-" {
            if arg == "-" {
                i += 1;
                continue;
            }
            break;
        }

        let split = match arg.as_str() {
            "-S" | "--split-string" => {
                let value = args.get(i + 1).cloned().unwrap_or_default();
                Some((value, 2))
            }
            _ if arg.starts_with("--split-string=") => {
                Some((arg["--split-string=".len()..].to_string(), 1))
            }
            _ if arg.starts_with("-S") => Some((arg[2..].to_string(), 1)),
            _ => None,
        };
        if let Some((value, width)) = split {
            let end = (i + width).min(args.len());
            args.splice(i..end, tokenize(&value));
            continue;
        }

        i += match arg.as_str() {
            "-u" | "-C" | "-P" | "--unset" | "--chdir" => 2,
            _ => 1,
        };
    }
    args.split_off(i.min(args.len()))
}

/// Parse a strict `NAME=value` assignment.
pub fn parse_assignment(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, value))
}

fn command_basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(command: &str) -> Vec<String> {
        strip_wrappers(&tokenize(command)).tokens
    }

    #[test]
    fn test_strip_sudo() {
        assert_eq!(strip("sudo ls -la"), vec!["ls", "-la"]);
    }

    #[test]
    fn test_strip_sudo_with_user() {
        assert_eq!(strip("sudo -u root -E git push"), vec!["git", "push"]);
        assert_eq!(strip("sudo --user=root -- rm x"), vec!["rm", "x"]);
    }

    #[test]
    fn test_strip_env() {
        let stripped = strip_wrappers(&tokenize("env -i FOO=bar -u HOME ls"));
        assert_eq!(stripped.tokens, vec!["ls"]);
        assert_eq!(stripped.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_strip_env_split_string() {
        assert_eq!(
            strip("env -S 'TMPDIR=/x git' reset --hard"),
            vec!["git", "reset", "--hard"]
        );
        assert_eq!(strip("env -S'rm -rf' /"), vec!["rm", "-rf", "/"]);
    }

    #[test]
    fn test_strip_leading_assignments() {
        let stripped = strip_wrappers(&tokenize("TMPDIR=/Users A=1 rm -rf x"));
        assert_eq!(stripped.tokens, vec!["rm", "-rf", "x"]);
        assert_eq!(stripped.env.get("TMPDIR").map(String::as_str), Some("/Users"));
    }

    #[test]
    fn test_non_strict_assignment_is_dropped() {
        assert_eq!(strip("1X=2 git status"), vec!["git", "status"]);
    }

    #[test]
    fn test_strip_command() {
        assert_eq!(strip("command -p git status"), vec!["git", "status"]);
        assert_eq!(strip("command -V git"), vec!["git"]);
        assert_eq!(strip("command -- rm -rf x"), vec!["rm", "-rf", "x"]);
    }

    #[test]
    fn test_strip_timeout_and_nice() {
        assert_eq!(strip("timeout 5 ls"), vec!["ls"]);
        assert_eq!(strip("timeout -s KILL 5s ls"), vec!["ls"]);
        assert_eq!(strip("nice -n 10 ionice -c 3 make"), vec!["make"]);
        assert_eq!(strip("nohup time -p make"), vec!["make"]);
    }

    #[test]
    fn test_nested_wrappers() {
        assert_eq!(strip("sudo env FOO=1 command git status"), vec!["git", "status"]);
        assert_eq!(strip("/usr/bin/sudo git status"), vec!["git", "status"]);
    }

    #[test]
    fn test_iteration_cap() {
        let command = format!("{}ls", "sudo ".repeat(30));
        let tokens = strip(&command);
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens.last().map(String::as_str), Some("ls"));
    }

    #[test]
    fn test_only_wrappers() {
        assert!(strip("sudo").is_empty());
        assert!(strip("FOO=1").is_empty());
    }

    #[test]
    fn test_no_wrapper() {
        assert_eq!(strip("ls -la"), vec!["ls", "-la"]);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("A_1=x=y"), Some(("A_1", "x=y")));
        assert_eq!(parse_assignment("_=1"), Some(("_", "1")));
        assert_eq!(parse_assignment("1A=x"), None);
        assert_eq!(parse_assignment("--opt=x"), None);
        assert_eq!(parse_assignment("plain"), None);
    }
}
