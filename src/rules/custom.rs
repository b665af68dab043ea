//! Custom user-defined rules.

use std::collections::BTreeSet;

use super::command_name;
use crate::config::CustomRule;
use crate::decision::Decision;

/// Check custom rules against a wrapper-stripped command.
///
/// The first rule whose command, subcommand and any blocked argument all
/// match wins.
pub fn check_custom_rules(tokens: &[String], rules: &[CustomRule]) -> Decision {
    let Some((head, args)) = tokens.split_first() else {
        return Decision::allow();
    };
    if rules.is_empty() {
        return Decision::allow();
    }

    let command = command_name(head);
    let subcommand = subcommand(args);
    let present = present_args(args);

    for rule in rules {
        if !rule.command.eq_ignore_ascii_case(&command) {
            continue;
        }
        if let Some(expected) = &rule.subcommand {
            if subcommand != Some(expected.as_str()) {
                continue;
            }
        }
        if rule.block_args.iter().any(|arg| present.contains(arg.as_str())) {
            return Decision::block(
                format!("custom.{}", rule.name),
                format!("[{}] {}", rule.name, rule.reason),
            );
        }
    }

    Decision::allow()
}

/// First non-option argument. Short options are not assumed to take a value.
fn subcommand(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            return iter.next().map(String::as_str);
        }
        if arg.starts_with('-') && arg.len() >= 2 {
            continue;
        }
        return Some(arg);
    }
    None
}

/// Every argument verbatim, plus `-x` for each letter of a short-option
/// bundle before `--`.
fn present_args(args: &[String]) -> BTreeSet<String> {
    let mut present: BTreeSet<String> = args.iter().cloned().collect();
    for arg in args.iter().take_while(|a| *a != "--") {
        let Some(letters) = arg.strip_prefix('-') else {
            continue;
        };
        if letters.starts_with('-') || letters.len() < 2 {
            continue;
        }
        present.extend(letters.chars().map(|ch| format!("-{ch}")));
    }
    present
}
