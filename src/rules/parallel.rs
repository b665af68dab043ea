//! GNU parallel command analysis.

use super::{
    Family, command_name, dash_c_script, has_dash_c, has_recursive_force, heuristics,
    unwrap_busybox,
};
use crate::analysis::Scope;
use crate::decision::Decision;
use crate::shell::strip_wrappers;

pub const REASON_PARALLEL_RM_RF: &str =
    "parallel can feed arbitrary input to rm -rf. List files first, then delete individually.";

const DEFAULT_PLACEHOLDER: &str = "{}";

/// Options whose value is the next token.
const VALUE_OPTIONS: &[&str] = &[
    "-I",
    "-j",
    "--jobs",
    "-S",
    "--sshlogin",
    "--sshloginfile",
    "--results",
    "--joblog",
    "--workdir",
    "--tmpdir",
    "--tempdir",
    "--tagstring",
];

#[derive(Debug, PartialEq, Eq)]
struct Invocation<'a> {
    /// Command template run once per argument.
    template: &'a [String],
    /// Arguments after `:::`.
    args: &'a [String],
    /// No `:::`: arguments come from stdin.
    dynamic: bool,
    /// Replacement string (`{}`, or the value of `-I`/`--replace`).
    placeholder: &'a str,
}

fn parse(tokens: &[String]) -> Invocation<'_> {
    let marker = tokens.iter().position(|t| t == ":::");
    let end = marker.unwrap_or(tokens.len());

    let mut placeholder: &str = DEFAULT_PLACEHOLDER;
    let mut i = 1;
    while i < end {
        let tok = tokens[i].as_str();
        if tok == "--" {
            i += 1;
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }

        match tok {
            "-I" => {
                if let Some(value) = tokens.get(i + 1).filter(|_| i + 1 < end) {
                    placeholder = value.as_str();
                }
            }
            "--replace" | "-i" => placeholder = DEFAULT_PLACEHOLDER,
            t if t.starts_with("--replace=") => placeholder = &t["--replace=".len()..],
            t if t.len() > 2 && (t.starts_with("-I") || t.starts_with("-i")) => {
                placeholder = &t[2..];
            }
            _ => {}
        }

        i += if VALUE_OPTIONS.contains(&tok) { 2 } else { 1 };
    }
    if placeholder.is_empty() {
        placeholder = DEFAULT_PLACEHOLDER;
    }

    Invocation {
        template: tokens.get(i..end).unwrap_or_default(),
        args: marker.map_or(&[][..], |m| &tokens[m + 1..]),
        dynamic: marker.is_none(),
        placeholder,
    }
}

/// The commands a template expands to for literal arguments.
///
/// `placeholder` is substituted when the template uses it; otherwise each
/// argument is appended.
fn expand(template: &[String], args: &[String], placeholder: &str) -> Vec<Vec<String>> {
    if args.is_empty() {
        return vec![template.to_vec()];
    }
    let substitutes = template.iter().any(|t| t.contains(placeholder));
    args.iter()
        .map(|arg| {
            if substitutes {
                template.iter().map(|t| t.replace(placeholder, arg)).collect()
            } else {
                let mut command = template.to_vec();
                command.push(arg.clone());
                command
            }
        })
        .collect()
}

fn arbitrary(head: &str) -> Decision {
    Decision::block(
        "parallel.arbitrary",
        format!("parallel {head} -c can execute arbitrary commands from input."),
    )
}

/// Analyze a parallel invocation (`tokens[0]` is `parallel`).
pub(crate) fn analyze_parallel(tokens: &[String], scope: &Scope<'_>) -> Decision {
    let invocation = parse(tokens);
    let stripped = strip_wrappers(invocation.template).tokens;
    let template = unwrap_busybox(&stripped);

    let Some(head) = template.first() else {
        // `parallel ::: cmd1 cmd2` runs each argument as a command.
        if invocation.dynamic {
            return Decision::allow();
        }
        return first_block(invocation.args.iter().map(|command| scope.nested(command)));
    };

    match Family::of(&command_name(head)) {
        Family::Shell => analyze_shell_template(head, template, &invocation, scope),
        Family::Rm if invocation.dynamic && has_recursive_force(&template[1..]) => {
            Decision::block("parallel.rm_rf", REASON_PARALLEL_RM_RF)
        }
        _ if invocation.dynamic => scope.dispatch(template),
        _ => first_block(
            expand(template, invocation.args, invocation.placeholder)
                .iter()
                .map(|command| scope.dispatch(command)),
        ),
    }
}

fn analyze_shell_template(
    head: &str,
    template: &[String],
    invocation: &Invocation<'_>,
    scope: &Scope<'_>,
) -> Decision {
    let Some(script) = dash_c_script(template) else {
        if has_dash_c(template) {
            return arbitrary(head);
        }
        return Decision::allow();
    };

    let placeholder = invocation.placeholder;
    if script.contains(placeholder) {
        if invocation.dynamic {
            if script.trim() == placeholder {
                return arbitrary(head);
            }
            if heuristics::is_rm_rf(script) {
                return Decision::block("parallel.rm_rf", REASON_PARALLEL_RM_RF);
            }
        } else if !invocation.args.is_empty() {
            return first_block(
                invocation
                    .args
                    .iter()
                    .map(|arg| scope.nested(&script.replace(placeholder, arg))),
            );
        }
    }
    scope.nested(script)
}

fn first_block(decisions: impl IntoIterator<Item = Decision>) -> Decision {
    decisions
        .into_iter()
        .find(Decision::is_blocked)
        .unwrap_or(Decision::Allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisContext, analyze};
    use crate::shell::tokenize;

    fn reason(command: &str) -> Option<String> {
        let ctx = AnalysisContext::new()
            .with_cwd("/home/dev/proj")
            .with_home("/home/dev");
        analyze(command, &ctx).map(|r| r.reason)
    }

    #[test]
    fn test_parse() {
        let tokens = tokenize("parallel -j 4 --joblog log gzip {} ::: a b");
        let inv = parse(&tokens);
        assert_eq!(inv.template, &tokens[5..7]);
        assert_eq!(inv.args, &tokens[8..]);
        assert!(!inv.dynamic);

        let tokens = tokenize("parallel -j4 rm -rf");
        let inv = parse(&tokens);
        assert_eq!(inv.template, &tokens[2..]);
        assert!(inv.dynamic);

        let tokens = tokenize("parallel ::: ls pwd");
        assert!(parse(&tokens).template.is_empty());
    }

    #[test]
    fn test_expand() {
        let template = tokenize("rm -rf {}/cache");
        let args = tokenize("a b");
        let expanded = expand(&template, &args, "{}");
        assert_eq!(expanded[1], ["rm", "-rf", "b/cache"]);

        let template = tokenize("rm -rf");
        assert_eq!(expand(&template, &args, "{}")[0], ["rm", "-rf", "a"]);

        let template = tokenize("cp X X.bak");
        assert_eq!(expand(&template, &args, "X")[0], ["cp", "a", "a.bak"]);
    }

    #[test]
    fn test_parse_replacement_string() {
        let placeholder = |command: &str| {
            let tokens = tokenize(command);
            parse(&tokens).placeholder.to_string()
        };
        assert_eq!(placeholder("parallel rm {} ::: a"), "{}");
        assert_eq!(placeholder("parallel -I X rm X ::: a"), "X");
        assert_eq!(placeholder("parallel -I{} rm {} ::: a"), "{}");
        assert_eq!(placeholder("parallel -IFILE rm FILE ::: a"), "FILE");
        assert_eq!(placeholder("parallel --replace=@ rm @ ::: a"), "@");
        assert_eq!(placeholder("parallel --replace rm {} ::: a"), "{}");

        let tokens = tokenize("parallel -I X rm -rf X ::: a");
        assert_eq!(parse(&tokens).template, &tokens[3..6]);
    }

    #[test]
    fn test_replacement_string_substituted() {
        assert!(reason("parallel -I {} rm -rf {} ::: /").is_some());
        assert!(reason("parallel -I X rm -rf X ::: /home/dev").is_some());
        assert!(reason("parallel -IX rm -rf X ::: build /").is_some());
        assert!(reason("parallel --replace=@ rm -rf @ ::: /etc").is_some());
        assert_eq!(reason("parallel -I X rm -rf X ::: build dist"), None);
        assert!(reason("parallel -I % bash -c 'echo %' ::: 'a; git reset --hard'").is_some());
        assert_eq!(
            reason("ls | parallel -I % sh -c %").as_deref(),
            Some("parallel sh -c can execute arbitrary commands from input.")
        );
    }

    #[test]
    fn test_rm_template() {
        assert_eq!(reason("parallel rm -rf {} ::: build dist"), None);
        assert_eq!(reason("parallel rm -rf ::: build"), None);
        assert!(reason("parallel rm -rf {} ::: build /").is_some());
        assert!(reason("parallel rm -rf ::: /etc").is_some());
        assert_eq!(
            reason("ls | parallel rm -rf").as_deref(),
            Some(REASON_PARALLEL_RM_RF)
        );
        assert_eq!(
            reason("ls | parallel busybox rm -rf {}").as_deref(),
            Some(REASON_PARALLEL_RM_RF)
        );
        assert_eq!(reason("ls | parallel rm {}"), None);
    }

    #[test]
    fn test_shell_template() {
        assert_eq!(
            reason("ls | parallel bash -c {}").as_deref(),
            Some("parallel bash -c can execute arbitrary commands from input.")
        );
        assert_eq!(
            reason("ls | parallel sh -c 'rm -rf {}'").as_deref(),
            Some(REASON_PARALLEL_RM_RF)
        );
        assert!(reason("parallel bash -c 'echo {}' ::: 'a; git reset --hard'").is_some());
        assert_eq!(reason("parallel bash -c 'echo {}' ::: a b"), None);
        assert!(reason("parallel bash -c").unwrap().contains("arbitrary"));
        assert!(reason("parallel sh -c 'git clean -fd'").is_some());
    }

    #[test]
    fn test_commands_as_arguments() {
        assert!(reason("parallel ::: 'git reset --hard' ls").is_some());
        assert_eq!(reason("parallel ::: 'cargo test' 'cargo clippy'"), None);
    }

    #[test]
    fn test_other_templates() {
        assert!(reason("parallel git {} ::: 'stash clear'").is_none());
        assert!(reason("parallel git stash {} ::: clear").is_some());
        assert!(reason("parallel find {} -delete ::: src").is_some());
        assert_eq!(reason("parallel -j4 gzip ::: a b"), None);
    }
}
