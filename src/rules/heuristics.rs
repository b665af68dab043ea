//! Text heuristics for command text that could not be tokenized, and for
//! inline interpreter code.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{find, git};

pub const REASON_RM_RF: &str = "rm -rf is destructive. List files first, then delete individually.";

static RM_RF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?:^|[^\w/\\])(?:/[^\s'";|&]+/)?rm\b[^\n;|&]*"#,
        r"(?:\s-(?:[a-z]*r[a-z]*f|[a-z]*f[a-z]*r)\b",
        r"|\s-r\b[^\n;|&]*\s-f\b",
        r"|\s-f\b[^\n;|&]*\s-r\b",
        r"|\s--recursive\b[^\n;|&]*\s--force\b",
        r"|\s--force\b[^\n;|&]*\s--recursive\b)",
    ))
    .expect("rm -rf heuristic is a valid regex")
});

static GIT_PUSH_SHORT_FORCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgit\s+push\s+-f\b").expect("push heuristic is a valid regex"));

static GIT_BRANCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bgit\s+branch\b").expect("branch heuristic is a valid regex"));

static UPPER_D_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s-D\b").expect("-D heuristic is a valid regex"));

static GIT_RESTORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgit\s+restore\b").expect("restore heuristic is a valid regex"));

static FIND_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfind\b[^\n;|&]*\s-delete\b").expect("find heuristic is a valid regex")
});

/// Heads whose arguments are only displayed or searched, never executed.
const DISPLAY_ONLY: &[&str] = &[
    "echo", "printf", "cat", "grep", "rg", "sed", "awk", "head", "tail", "wc", "less",
];

/// A text match: rule id and reason.
pub type Hit = (&'static str, &'static str);

/// True when `text` contains an `rm` with both recursive and force flags.
pub fn is_rm_rf(text: &str) -> bool {
    RM_RF.is_match(&text.to_lowercase())
}

/// True when the first word of `piece` only prints or searches text.
pub fn is_display_only(piece: &str) -> bool {
    piece
        .split_whitespace()
        .next()
        .map(|head| head.rsplit('/').next().unwrap_or(head).to_ascii_lowercase())
        .is_some_and(|head| DISPLAY_ONLY.contains(&head.as_str()))
}

/// Scan raw text for destructive commands, first match wins.
pub fn scan_text(text: &str) -> Option<Hit> {
    let lower = text.to_lowercase();
    let t = lower.as_str();

    if RM_RF.is_match(t) {
        return Some(("rm.recursive_force", REASON_RM_RF));
    }
    if t.contains("git reset --hard") {
        return Some(("git.reset.hard", git::REASON_RESET_HARD));
    }
    if t.contains("git reset --merge") {
        return Some(("git.reset.merge", git::REASON_RESET_MERGE));
    }
    if t.contains("git checkout --") {
        return Some(("git.checkout.discard", git::REASON_CHECKOUT_DOUBLE_DASH));
    }
    if t.contains("git clean -f") || t.contains("git clean --force") {
        return Some(("git.clean.force", git::REASON_CLEAN_FORCE));
    }
    if (t.contains("git push --force") || GIT_PUSH_SHORT_FORCE.is_match(t))
        && !t.contains("--force-with-lease")
    {
        return Some(("git.push.force", git::REASON_PUSH_FORCE));
    }
    // -D and -d differ, so this one looks at the original case.
    if GIT_BRANCH.is_match(text) && UPPER_D_FLAG.is_match(text) {
        return Some(("git.branch.force_delete", git::REASON_BRANCH_FORCE_DELETE));
    }
    if t.contains("git stash drop") {
        return Some(("git.stash.drop", git::REASON_STASH_DROP));
    }
    if t.contains("git stash clear") {
        return Some(("git.stash.clear", git::REASON_STASH_CLEAR));
    }
    if GIT_RESTORE.is_match(t) {
        if t.contains("--worktree") {
            return Some(("git.restore.worktree", git::REASON_RESTORE_WORKTREE));
        }
        if !(t.contains("--staged") || t.contains("--help") || t.contains("--version")) {
            return Some(("git.restore", git::REASON_RESTORE));
        }
    }
    if FIND_DELETE.is_match(t) {
        return Some(("find.delete", find::REASON_FIND_DELETE));
    }
    None
}
