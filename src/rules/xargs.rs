//! xargs command analysis.
//!
//! xargs appends (or substitutes) input it reads at runtime, so rm targets on
//! the command line never tell the whole story.

use super::{
    Family, command_name, dash_c_script, has_dash_c, has_recursive_force, interpreter,
    unwrap_busybox,
};
use crate::analysis::Scope;
use crate::decision::Decision;
use crate::shell::strip_wrappers;

pub const REASON_XARGS_RM_RF: &str =
    "xargs can feed arbitrary input to rm -rf. List files first, then delete individually.";

/// Options whose value is the next token.
const VALUE_OPTIONS: &[&str] = &[
    "-a",
    "-I",
    "-J",
    "-L",
    "-l",
    "-n",
    "-R",
    "-S",
    "-s",
    "-P",
    "-d",
    "-E",
    "--arg-file",
    "--delimiter",
    "--eof",
    "--max-args",
    "--max-lines",
    "--max-procs",
    "--max-chars",
    "--process-slot-var",
];

/// An xargs invocation split into its options and the command it runs.
#[derive(Debug, Default, PartialEq, Eq)]
struct Invocation<'a> {
    child: &'a [String],
    /// Placeholders replaced with input (`-I {}`, `-i`, `--replace=X`).
    replacements: Vec<&'a str>,
}

fn parse(tokens: &[String]) -> Invocation<'_> {
    let mut replacements = Vec::new();
    let mut i = 1;
    while let Some(tok) = tokens.get(i) {
        if tok == "--" {
            i += 1;
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }

        match tok.as_str() {
            "-I" | "-J" => {
                if let Some(value) = tokens.get(i + 1) {
                    replacements.push(value.as_str());
                }
            }
            "-i" | "--replace" | "--replace=" | "--replace-str" => replacements.push("{}"),
            t if t.starts_with("--replace=") => replacements.push(&t["--replace=".len()..]),
            t if t.len() > 2 && (t.starts_with("-I") || t.starts_with("-J") || t.starts_with("-i")) => {
                replacements.push(&t[2..]);
            }
            _ => {}
        }

        i += if VALUE_OPTIONS.contains(&tok.as_str()) { 2 } else { 1 };
    }

    Invocation {
        child: tokens.get(i..).unwrap_or_default(),
        replacements,
    }
}

fn arbitrary(child_head: &str) -> Decision {
    Decision::block(
        "xargs.arbitrary",
        format!("xargs {child_head} -c can execute arbitrary commands from input."),
    )
}

/// Analyze an xargs invocation (`tokens[0]` is `xargs`).
pub(crate) fn analyze_xargs(tokens: &[String], scope: &Scope<'_>) -> Decision {
    let invocation = parse(tokens);
    let stripped = strip_wrappers(invocation.child).tokens;
    let child = unwrap_busybox(&stripped);
    let Some(head) = child.first() else {
        return Decision::allow();
    };

    match Family::of(&command_name(head)) {
        Family::Rm if has_recursive_force(&child[1..]) => {
            Decision::block("xargs.rm_rf", REASON_XARGS_RM_RF)
        }
        Family::Shell => match dash_c_script(child) {
            Some(script) => {
                let script = script.trim();
                if invocation.replacements.contains(&script) {
                    return arbitrary(head);
                }
                let substituted = invocation
                    .replacements
                    .iter()
                    .any(|r| !r.is_empty() && script.contains(r));
                if substituted && super::heuristics::is_rm_rf(script) {
                    return Decision::block("xargs.rm_rf", REASON_XARGS_RM_RF);
                }
                scope.nested(script)
            }
            None if has_dash_c(child) => arbitrary(head),
            None => Decision::allow(),
        },
        Family::Interpreter
            if interpreter::inline_code(child)
                .is_some_and(|code| invocation.replacements.contains(&code.trim())) =>
        {
            Decision::block(
                "xargs.arbitrary",
                format!("xargs {head} can execute arbitrary code from input."),
            )
        }
        _ => scope.dispatch(child),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisContext, analyze};
    use crate::shell::tokenize;

    fn ctx() -> AnalysisContext {
        AnalysisContext::new()
            .with_cwd("/home/dev/proj")
            .with_home("/home/dev")
    }

    fn reason(command: &str) -> Option<String> {
        analyze(command, &ctx()).map(|r| r.reason)
    }

    #[test]
    fn test_parse_child() {
        let tokens = tokenize("xargs -n 1 -P4 --max-procs 2 -0 rm -f");
        assert_eq!(parse(&tokens).child, &tokens[7..]);

        let tokens = tokenize("xargs -- -rm");
        assert_eq!(parse(&tokens).child, &tokens[2..]);

        let tokens = tokenize("xargs -i echo {}");
        assert_eq!(parse(&tokens).child, &tokens[2..]);

        let tokens = tokenize("xargs -0");
        assert!(parse(&tokens).child.is_empty());
    }

    #[test]
    fn test_replacement_tokens() {
        let of = |command: &str| {
            let tokens = tokenize(command);
            parse(&tokens).replacements.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        };
        assert_eq!(of("xargs -I % sh -c 'echo %'"), ["%"]);
        assert_eq!(of("xargs -IFILE cp FILE /x"), ["FILE"]);
        assert_eq!(of("xargs -i echo"), ["{}"]);
        assert_eq!(of("xargs -iX echo"), ["X"]);
        assert_eq!(of("xargs --replace echo"), ["{}"]);
        assert_eq!(of("xargs --replace=@ echo"), ["@"]);
        assert_eq!(of("xargs -n 1 -I {} echo"), ["{}"]);
        assert!(of("xargs echo").is_empty());
    }

    #[test]
    fn test_rm_rf_child_blocks() {
        for command in [
            "find . -name '*.tmp' | xargs rm -rf",
            "ls | xargs -0 rm -Rf",
            "cat list | xargs -n1 sudo rm -r -f",
            "cat list | xargs busybox rm -rf",
            "cat list | xargs rm -rf /tmp/safe-looking",
        ] {
            assert_eq!(reason(command).as_deref(), Some(REASON_XARGS_RM_RF), "{command}");
        }
    }

    #[test]
    fn test_harmless_children_allowed() {
        for command in [
            "find . -name '*.rs' | xargs grep TODO",
            "ls | xargs rm -f",
            "cat list | xargs",
            "echo x | xargs -0",
            "find . | xargs -I {} echo {}",
        ] {
            assert_eq!(reason(command), None, "{command}");
        }
    }

    #[test]
    fn test_shell_child() {
        let r = reason("ls | xargs -I {} sh -c '{}'").unwrap();
        assert_eq!(r, "xargs sh -c can execute arbitrary commands from input.");
        assert_eq!(
            reason("ls | xargs -I {} bash -c 'rm -rf {}'").as_deref(),
            Some(REASON_XARGS_RM_RF)
        );
        assert!(reason("ls | xargs bash -c").unwrap().contains("arbitrary"));
        assert!(reason("ls | xargs bash -c 'git reset --hard'").is_some());
        assert_eq!(reason("ls | xargs -I {} bash -c 'echo {}'"), None);
    }

    #[test]
    fn test_other_families_dispatched() {
        assert!(reason("echo main | xargs git reset --hard").is_some());
        assert!(reason("echo . | xargs find -delete").is_some());
        assert!(reason("ls | xargs -I % python -c %").unwrap().contains("arbitrary"));
        assert_eq!(reason("echo main | xargs git log"), None);
    }
}
