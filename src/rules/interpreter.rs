//! Interpreter one-liners (`python -c`, `node -e`, ...).

use super::heuristics;
use crate::decision::Decision;

pub const REASON_PARANOID: &str = "Cannot safely analyze interpreter one-liners. [paranoid mode - disable with: unset SAFETY_NET_PARANOID SAFETY_NET_PARANOID_INTERPRETERS]";

/// True for `python`, `python3`, `python3.12`, `node`, `ruby` and `perl`.
pub fn is_interpreter(name: &str) -> bool {
    if let Some(version) = name.strip_prefix("python") {
        return version.chars().all(|c| c.is_ascii_digit() || c == '.');
    }
    matches!(name, "node" | "nodejs" | "ruby" | "perl")
}

/// Index of the inline code argument, if the invocation has one.
fn code_position(tokens: &[String]) -> Option<usize> {
    let flag = tokens
        .iter()
        .skip(1)
        .take_while(|tok| *tok != "--")
        .position(|tok| matches!(tok.as_str(), "-c" | "-e" | "-E" | "--eval"))?;
    let code = flag + 2;
    (code < tokens.len()).then_some(code)
}

/// The inline code of an interpreter invocation.
pub fn inline_code(tokens: &[String]) -> Option<&str> {
    code_position(tokens).map(|i| tokens[i].as_str())
}

/// Analyze an interpreter invocation (`tokens[0]` is the interpreter).
///
/// The code and any words after it are scanned together: a broken quote in
/// the code spills it into the following words.
pub fn analyze_interpreter(tokens: &[String], paranoid: bool) -> Decision {
    let Some(code) = code_position(tokens) else {
        return Decision::allow();
    };
    analyze_script(&tokens[code..].join(" "), paranoid)
}

/// True when the interpreter takes its program from standard input: no
/// inline code, no `-m` module and no script operand other than `-`.
pub fn interpreter_reads_stdin(tokens: &[String]) -> bool {
    for tok in tokens.iter().skip(1) {
        match tok.as_str() {
            "-" => return true,
            "-c" | "-e" | "-E" | "--eval" | "-m" => return false,
            t if t.starts_with('-') => {}
            _ => return false,
        }
    }
    true
}

/// Analyze program text an interpreter will run.
pub fn analyze_script(text: &str, paranoid: bool) -> Decision {
    if let Some((rule, reason)) = heuristics::scan_text(text) {
        return Decision::block(rule, reason);
    }
    if paranoid {
        return Decision::block("interpreter.paranoid", REASON_PARANOID);
    }
    Decision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::tokenize;

    fn check(command: &str, paranoid: bool) -> Decision {
        analyze_interpreter(&tokenize(command), paranoid)
    }

    #[test]
    fn test_is_interpreter() {
        assert!(is_interpreter("python"));
        assert!(is_interpreter("python3.11"));
        assert!(is_interpreter("perl"));
        assert!(!is_interpreter("pythonista"));
        assert!(!is_interpreter("bash"));
    }

    #[test]
    fn test_dangerous_code_blocks() {
        let d = check("python -c \"import os; os.system('rm -rf /')\"", false);
        assert_eq!(d.result().unwrap().rule, "rm.recursive_force");
        assert!(check("node -e \"require('child_process').execSync('git reset --hard')\"", false).is_blocked());
        assert!(check("ruby -e 'system(\"git clean -fd\")'", false).is_blocked());
        assert!(check("perl -e 'system(\"find . -delete\")'", false).is_blocked());
    }

    #[test]
    fn test_reads_stdin() {
        assert!(interpreter_reads_stdin(&tokenize("python3")));
        assert!(interpreter_reads_stdin(&tokenize("python3 -u -")));
        assert!(interpreter_reads_stdin(&tokenize("node --no-warnings")));
        assert!(!interpreter_reads_stdin(&tokenize("python3 script.py")));
        assert!(!interpreter_reads_stdin(&tokenize("python3 -m http.server")));
        assert!(!interpreter_reads_stdin(&tokenize("ruby -e 'puts 1'")));
    }

    #[test]
    fn test_script_text() {
        assert!(analyze_script("import shutil\nos.system('git clean -fd')", false).is_blocked());
        assert!(!analyze_script("print('hi')", false).is_blocked());
        assert!(analyze_script("print('hi')", true).is_blocked());
    }

    #[test]
    fn test_broken_quoting_still_scanned() {
        assert!(check(r#"python -c "import os; os.system("rm -rf /some/path")""#, false).is_blocked());
    }

    #[test]
    fn test_harmless_code_allowed() {
        assert!(!check("python -c 'print(1)'", false).is_blocked());
        assert!(!check("python script.py", false).is_blocked());
        assert!(!check("python -c", false).is_blocked());
    }

    #[test]
    fn test_paranoid_blocks_any_one_liner() {
        let d = check("python -c 'print(1)'", true);
        assert_eq!(d.result().unwrap().reason, REASON_PARANOID);
        assert!(!check("python script.py", true).is_blocked());
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(inline_code(&tokenize("node -e 'x()'")), Some("x()"));
        assert_eq!(inline_code(&tokenize("python -- -c x")), None);
    }
}
