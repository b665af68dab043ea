//! Bash command analysis.
//!
//! A command line is split into segments; each segment is stripped of
//! wrappers and dispatched on its command name. Shell `-c` scripts and
//! xargs/parallel children are analyzed recursively through [`Scope`].

use std::collections::BTreeMap;

use super::AnalysisContext;
use crate::decision::{AnalysisResult, Decision};
use crate::rules::heuristics::{is_display_only, scan_text};
use crate::rules::{
    Family, RmScope, analyze_find, analyze_git, analyze_interpreter, analyze_parallel, analyze_rm,
    analyze_script, analyze_xargs, check_custom_rules, command_name, dash_c_script, has_dash_c,
    interpreter_reads_stdin, is_temp_dir, shell_reads_stdin, unwrap_busybox,
};
use crate::shell::{Segment, segment, split_raw, strip_wrappers};

/// Nested shell scripts deeper than this are not analyzed.
pub const MAX_RECURSION_DEPTH: usize = 5;

pub const REASON_UNPARSEABLE: &str =
    "Unable to parse shell command safely. [strict mode - disable with: unset SAFETY_NET_STRICT]";
pub const REASON_SHELL_WRAPPER: &str =
    "Unable to parse shell -c wrapper safely. [strict mode - disable with: unset SAFETY_NET_STRICT]";

/// Analyze a full command line. `None` means the command may run.
pub fn analyze(command: &str, ctx: &AnalysisContext) -> Option<AnalysisResult> {
    let cwd = ctx.cwd.as_deref().filter(|cwd| !cwd.is_empty());
    let result = analyze_at(command, ctx, cwd, 0).into_result()?;
    tracing::debug!(rule = %result.rule, segment = %result.segment, "command blocked");
    Some(result)
}

fn analyze_at(command: &str, ctx: &AnalysisContext, cwd: Option<&str>, depth: usize) -> Decision {
    let mut cwd = cwd;
    for seg in segment(command) {
        let decision = analyze_segment(&seg, ctx, cwd, depth);
        if decision.is_blocked() {
            return decision.within(&seg.text);
        }
        // After cd the directory is unknown for the rest of the line.
        if cwd.is_some() && changes_cwd(&seg) {
            tracing::trace!(segment = %seg.text, "cwd no longer known");
            cwd = None;
        }
    }
    Decision::allow()
}

/// Analyze one segment.
pub fn analyze_segment(
    seg: &Segment,
    ctx: &AnalysisContext,
    cwd: Option<&str>,
    depth: usize,
) -> Decision {
    if seg.is_opaque() {
        return analyze_opaque(&seg.text, ctx);
    }

    let stripped = strip_wrappers(&seg.tokens);
    if stripped.tokens.is_empty() {
        return Decision::allow();
    }

    let scope = Scope {
        ctx,
        cwd,
        depth,
        allow_tmpdir_var: ctx.modes.allow_tmpdir_var && tmpdir_untouched(&stripped.env),
    };

    // 1. Built-in detectors
    let decision = scope.dispatch(&stripped.tokens);
    if decision.is_blocked() {
        return decision;
    }

    // 2. Scripts fed through heredocs and here-strings
    let decision = scope.stdin(&stripped.tokens, &seg.stdin);
    if decision.is_blocked() || depth > 0 {
        return decision;
    }

    // 3. Custom rules, top level only
    check_custom_rules(unwrap_busybox(&stripped.tokens), &ctx.rules)
}

/// `$TMPDIR` still names a temp directory after this segment's assignments.
fn tmpdir_untouched(env: &BTreeMap<String, String>) -> bool {
    env.get("TMPDIR").is_none_or(|value| is_temp_dir(value))
}

/// Text that could not be tokenized: block in strict mode, otherwise scan
/// each operator-separated piece.
fn analyze_opaque(text: &str, ctx: &AnalysisContext) -> Decision {
    if ctx.modes.strict {
        return Decision::block("strict.unparseable", REASON_UNPARSEABLE);
    }
    for piece in split_raw(text) {
        if is_display_only(piece) {
            continue;
        }
        if let Some((rule, reason)) = scan_text(piece) {
            return Decision::block(rule, reason);
        }
    }
    Decision::allow()
}

fn changes_cwd(seg: &Segment) -> bool {
    if seg.is_opaque() {
        return split_raw(&seg.text)
            .iter()
            .any(|piece| piece.split_whitespace().next().is_some_and(is_cd));
    }
    let stripped = strip_wrappers(&seg.tokens).tokens;
    let tokens = match stripped.split_first() {
        Some((head, rest)) if command_name(head) == "builtin" => rest,
        _ => &stripped[..],
    };
    tokens.first().is_some_and(|head| is_cd(head))
}

fn is_cd(token: &str) -> bool {
    matches!(command_name(token).as_str(), "cd" | "pushd" | "popd")
}

/// Where a segment runs, shared with detectors that analyze child commands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    ctx: &'a AnalysisContext,
    cwd: Option<&'a str>,
    depth: usize,
    allow_tmpdir_var: bool,
}

impl<'a> Scope<'a> {
    /// Analyze a script run by a nested shell.
    pub(crate) fn nested(&self, script: &str) -> Decision {
        if self.depth >= MAX_RECURSION_DEPTH {
            tracing::debug!(depth = self.depth, "recursion limit reached, not analyzing nested script");
            return Decision::allow();
        }
        analyze_at(script, self.ctx, self.cwd, self.depth + 1)
    }

    pub(crate) fn rm_scope(&self) -> RmScope<'a> {
        RmScope {
            cwd: self.cwd,
            home: self.ctx.home.as_deref(),
            tmpdir: self.ctx.tmpdir.as_deref(),
            allow_tmpdir_var: self.allow_tmpdir_var,
            paranoid: self.ctx.modes.paranoid_rm,
        }
    }

    /// Run the detector for the command at the head of `tokens`.
    pub(crate) fn dispatch(&self, tokens: &[String]) -> Decision {
        let tokens = unwrap_busybox(tokens);
        let Some(head) = tokens.first() else {
            return Decision::allow();
        };

        match Family::of(&command_name(head)) {
            Family::Shell => self.shell(tokens),
            Family::Interpreter => {
                analyze_interpreter(tokens, self.ctx.modes.paranoid_interpreters)
            }
            Family::Git => analyze_git(tokens),
            Family::Rm => analyze_rm(tokens, &self.rm_scope()),
            Family::Find => analyze_find(&tokens[1..]),
            Family::Xargs => analyze_xargs(tokens, self),
            Family::Parallel => analyze_parallel(tokens, self),
            Family::Other => self.other(tokens),
        }
    }

    /// A command without its own detector. `eval` runs its arguments as a
    /// script. Other heads (`exec`, `watch`, ...) are searched for an
    /// embedded rm, git or find; without one the words are scanned as text.
    /// Display-only heads pass.
    fn other(&self, tokens: &[String]) -> Decision {
        let Some((head, args)) = tokens.split_first() else {
            return Decision::allow();
        };
        if is_display_only(head) {
            return Decision::allow();
        }
        if command_name(head) == "eval" {
            return self.nested(&args.join(" "));
        }

        let mut embedded = false;
        for (i, tok) in args.iter().enumerate() {
            if matches!(Family::of(&command_name(tok)), Family::Rm | Family::Git | Family::Find) {
                embedded = true;
                let decision = self.dispatch(&args[i..]);
                if decision.is_blocked() {
                    return decision;
                }
            }
        }
        if embedded {
            return Decision::allow();
        }
        match scan_text(&tokens.join(" ")) {
            Some((rule, reason)) => Decision::block(rule, reason),
            None => Decision::allow(),
        }
    }

    /// Analyze heredoc and here-string bodies the command runs as a script.
    fn stdin(&self, tokens: &[String], bodies: &[String]) -> Decision {
        let tokens = unwrap_busybox(tokens);
        let Some(head) = tokens.first() else {
            return Decision::allow();
        };
        let family = Family::of(&command_name(head));
        let runs_stdin = match family {
            Family::Shell => shell_reads_stdin(tokens),
            Family::Interpreter => interpreter_reads_stdin(tokens),
            _ => false,
        };
        if !runs_stdin {
            return Decision::allow();
        }

        for body in bodies {
            let decision = if family == Family::Shell {
                self.nested(body)
            } else {
                analyze_script(body, self.ctx.modes.paranoid_interpreters)
            };
            if decision.is_blocked() {
                return decision;
            }
        }
        Decision::allow()
    }

    fn shell(&self, tokens: &[String]) -> Decision {
        match dash_c_script(tokens) {
            Some(script) => self.nested(script),
            None if self.ctx.modes.strict && has_dash_c(tokens) => {
                Decision::block("strict.shell_wrapper", REASON_SHELL_WRAPPER)
            }
            None => Decision::allow(),
        }
    }
}
