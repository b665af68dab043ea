//! Git command analysis.

use super::{long_opts, short_opts};
use crate::decision::Decision;

pub const REASON_CHECKOUT_DOUBLE_DASH: &str =
    "git checkout -- discards uncommitted changes permanently. Use 'git stash' first.";
pub const REASON_CHECKOUT_REF_DOUBLE_DASH: &str =
    "git checkout <ref> -- <path> overwrites working tree. Use 'git stash' first.";
pub const REASON_CHECKOUT_REF_PATHSPEC: &str =
    "git checkout <ref> <path> overwrites working tree. Use 'git stash' first.";
pub const REASON_CHECKOUT_PATHSPEC_FROM_FILE: &str =
    "git checkout --pathspec-from-file overwrites working tree. Use 'git stash' first.";
pub const REASON_RESTORE: &str =
    "git restore discards uncommitted changes. Use 'git stash' or 'git diff' first.";
pub const REASON_RESTORE_WORKTREE: &str =
    "git restore --worktree discards uncommitted changes permanently.";
pub const REASON_RESET_HARD: &str =
    "git reset --hard destroys uncommitted changes. Use 'git stash' first.";
pub const REASON_RESET_MERGE: &str = "git reset --merge can lose uncommitted changes.";
pub const REASON_CLEAN_FORCE: &str =
    "git clean -f removes untracked files permanently. Review with 'git clean -n' first.";
pub const REASON_PUSH_FORCE: &str =
    "Force push can destroy remote history. Use --force-with-lease if necessary.";
pub const REASON_WORKTREE_REMOVE_FORCE: &str =
    "git worktree remove --force can delete worktree files. Verify the path first.";
pub const REASON_BRANCH_FORCE_DELETE: &str =
    "git branch -D force-deletes without merge check. Use -d for safety.";
pub const REASON_STASH_DROP: &str =
    "git stash drop permanently deletes stashed changes. List stashes first with 'git stash list'.";
pub const REASON_STASH_CLEAR: &str = "git stash clear permanently deletes ALL stashed changes.";

/// Global git options that consume the following token.
const GLOBAL_OPTS_WITH_VALUE: &[&str] = &[
    "-c",
    "-C",
    "--exec-path",
    "--git-dir",
    "--namespace",
    "--super-prefix",
    "--work-tree",
];

/// Analyze a git command (`tokens[0]` is `git`) for destructive operations.
pub fn analyze_git(tokens: &[String]) -> Decision {
    let Some((subcommand, args)) = subcommand_and_args(tokens) else {
        return Decision::allow();
    };

    match subcommand.to_ascii_lowercase().as_str() {
        "checkout" => analyze_git_checkout(args),
        "restore" => analyze_git_restore(args),
        "reset" => analyze_git_reset(args),
        "clean" => analyze_git_clean(args),
        "push" => analyze_git_push(args),
        "branch" => analyze_git_branch(args),
        "stash" => analyze_git_stash(args),
        "worktree" => analyze_git_worktree(args),
        _ => Decision::allow(),
    }
}

/// Skip global options and return the subcommand with its arguments.
fn subcommand_and_args(tokens: &[String]) -> Option<(&str, &[String])> {
    let mut i = 1;
    while let Some(tok) = tokens.get(i) {
        if tok == "--" {
            i += 1;
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }
        if GLOBAL_OPTS_WITH_VALUE.contains(&tok.as_str()) {
            i += 2;
        } else {
            // Flags, `--opt=value`, and attached values like `-Crepo`.
            i += 1;
        }
    }
    let subcommand = tokens.get(i)?;
    Some((subcommand.as_str(), &tokens[i + 1..]))
}

fn lowered(args: &[String]) -> Vec<String> {
    args.iter().map(|a| a.to_ascii_lowercase()).collect()
}

fn analyze_git_checkout(args: &[String]) -> Decision {
    if let Some(idx) = args.iter().position(|a| a == "--") {
        let reason = if idx == 0 {
            REASON_CHECKOUT_DOUBLE_DASH
        } else {
            REASON_CHECKOUT_REF_DOUBLE_DASH
        };
        return Decision::block("git.checkout.discard", reason);
    }

    // Creating a branch never overwrites files.
    let short = short_opts(args);
    if short.contains(&'b') || short.contains(&'B') || long_opts(args).contains("--orphan") {
        return Decision::allow();
    }

    let pathspec_from_file = args.iter().any(|a| {
        let a = a.to_ascii_lowercase();
        a == "--pathspec-from-file" || a.starts_with("--pathspec-from-file=")
    });
    if pathspec_from_file {
        return Decision::block("git.checkout.pathspec", REASON_CHECKOUT_PATHSPEC_FROM_FILE);
    }

    if checkout_positionals(args).len() >= 2 {
        return Decision::block("git.checkout.pathspec", REASON_CHECKOUT_REF_PATHSPEC);
    }

    Decision::allow()
}

/// Positional arguments of `git checkout`, skipping options and their values.
fn checkout_positionals(args: &[String]) -> Vec<&str> {
    const WITH_VALUE: &[&str] = &[
        "-b",
        "-B",
        "--orphan",
        "--conflict",
        "-U",
        "--unified",
        "--inter-hunk-context",
        "--pathspec-from-file",
    ];

    let mut positionals = Vec::new();
    let mut i = 0;
    while let Some(tok) = args.get(i) {
        let tok = tok.as_str();
        let next = args.get(i + 1).map(String::as_str);
        if tok == "--" {
            break;
        }
        // `-` means the previous branch.
        if tok == "-" || !tok.starts_with('-') {
            positionals.push(tok);
            i += 1;
            continue;
        }

        i += match tok {
            _ if tok.starts_with("--") && tok.contains('=') => 1,
            _ if WITH_VALUE.contains(&tok) => 2,
            "--recurse-submodules" if matches!(next, Some("checkout" | "on-demand")) => 2,
            "-t" | "--track" if matches!(next, Some("direct" | "inherit")) => 2,
            // An unknown long option may take a value; don't count it as a path.
            _ if tok.starts_with("--") && !is_checkout_flag(tok) => {
                if next.is_some_and(|n| !n.starts_with('-')) { 2 } else { 1 }
            }
            _ => 1,
        };
    }
    positionals
}

fn is_checkout_flag(tok: &str) -> bool {
    matches!(
        tok,
        "--force"
            | "--merge"
            | "--quiet"
            | "--detach"
            | "--ignore-skip-worktree-bits"
            | "--overwrite-ignore"
            | "--no-overlay"
            | "--overlay"
            | "--progress"
            | "--no-progress"
            | "--guess"
            | "--no-guess"
            | "--pathspec-file-nul"
            | "--recurse-submodules"
            | "--no-recurse-submodules"
            | "--track"
            | "--no-track"
    )
}

fn analyze_git_restore(args: &[String]) -> Decision {
    let lower = lowered(args);
    let has = |flag: &str| lower.iter().any(|a| a == flag);

    if has("--worktree") || short_opts(args).contains(&'W') {
        return Decision::block("git.restore.worktree", REASON_RESTORE_WORKTREE);
    }
    if has("-h") || has("--help") || has("--version") {
        return Decision::allow();
    }
    if has("--staged") || short_opts(args).contains(&'S') {
        return Decision::allow();
    }
    if restore_has_target(args) {
        return Decision::block("git.restore", REASON_RESTORE);
    }
    Decision::allow()
}

fn restore_has_target(args: &[String]) -> bool {
    let mut i = 0;
    while let Some(tok) = args.get(i) {
        if tok == "--" {
            return i + 1 < args.len();
        }
        if tok.starts_with("--pathspec-from-file") {
            return true;
        }
        i += match tok.as_str() {
            "-s" | "--source" | "--conflict" => 2,
            t if t.starts_with('-') && t != "-" => 1,
            _ => return true,
        };
    }
    false
}

fn analyze_git_reset(args: &[String]) -> Decision {
    let long = long_opts(args);
    if long.contains("--hard") {
        return Decision::block("git.reset.hard", REASON_RESET_HARD);
    }
    if long.contains("--merge") {
        return Decision::block("git.reset.merge", REASON_RESET_MERGE);
    }
    Decision::allow()
}

fn analyze_git_clean(args: &[String]) -> Decision {
    if long_opts(args).contains("--force") || short_opts(args).contains(&'f') {
        return Decision::block("git.clean.force", REASON_CLEAN_FORCE);
    }
    Decision::allow()
}

fn analyze_git_push(args: &[String]) -> Decision {
    let lower = lowered(args);
    if lower.iter().any(|a| a.starts_with("--force-with-lease")) {
        return Decision::allow();
    }

    let force_flag = lower.iter().any(|a| a == "--force") || short_opts(args).contains(&'f');
    // `+ref` force-updates that ref.
    let force_refspec = args
        .iter()
        .any(|a| a.len() > 1 && a.starts_with('+'));
    if force_flag || force_refspec {
        return Decision::block("git.push.force", REASON_PUSH_FORCE);
    }
    Decision::allow()
}

fn analyze_git_branch(args: &[String]) -> Decision {
    if args.iter().any(|a| a == "-D") || short_opts(args).contains(&'D') {
        return Decision::block("git.branch.force_delete", REASON_BRANCH_FORCE_DELETE);
    }
    Decision::allow()
}

fn analyze_git_stash(args: &[String]) -> Decision {
    match args.first().map(String::as_str) {
        Some("drop") => Decision::block("git.stash.drop", REASON_STASH_DROP),
        Some("clear") => Decision::block("git.stash.clear", REASON_STASH_CLEAR),
        _ => Decision::allow(),
    }
}

fn analyze_git_worktree(args: &[String]) -> Decision {
    let Some((action, rest)) = args.split_first() else {
        return Decision::allow();
    };
    if !action.eq_ignore_ascii_case("remove") {
        return Decision::allow();
    }
    if long_opts(rest).contains("--force") || short_opts(rest).contains(&'f') {
        return Decision::block("git.worktree.remove_force", REASON_WORKTREE_REMOVE_FORCE);
    }
    Decision::allow()
}
