//! Shell `-c` wrappers.

/// Shells whose `-c` argument is analyzed as a nested command line.
const SHELLS: &[&str] = &["bash", "sh", "zsh", "ksh", "dash", "fish", "csh", "tcsh"];

/// Short options that may be bundled with `c` (`-lc`, `-ec`, `-xc`).
const BUNDLE_LETTERS: &[char] = &['c', 'e', 'i', 'l', 's', 'u', 'v', 'x'];

pub fn is_shell(name: &str) -> bool {
    SHELLS.contains(&name)
}

/// Position of the `-c` option of a shell invocation, before any `--`.
fn dash_c_position(tokens: &[String]) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(1)
        .take_while(|(_, tok)| *tok != "--")
        .find(|(_, tok)| is_dash_c(tok))
        .map(|(i, _)| i)
}

fn is_dash_c(tok: &str) -> bool {
    let Some(letters) = tok.strip_prefix('-') else {
        return false;
    };
    !letters.is_empty()
        && letters.contains('c')
        && letters.chars().all(|ch| BUNDLE_LETTERS.contains(&ch))
}

/// The script passed with `-c`, if there is one.
pub fn dash_c_script(tokens: &[String]) -> Option<&str> {
    let pos = dash_c_position(tokens)?;
    tokens.get(pos + 1).map(String::as_str)
}

/// True when the shell reads its script from standard input: no `-c`, and
/// either `-s` or no script operand.
pub fn shell_reads_stdin(tokens: &[String]) -> bool {
    let mut args = tokens.iter().skip(1);
    while let Some(tok) = args.next() {
        if is_dash_c(tok) {
            return false;
        }
        match tok.as_str() {
            "-" | "--" => return args.next().is_none(),
            "-o" | "+o" | "-O" | "+O" => {
                args.next();
            }
            t if t.starts_with("--") => {}
            t if t.starts_with('-') || t.starts_with('+') => {
                if t[1..].contains('s') {
                    return true;
                }
            }
            _ => return false,
        }
    }
    true
}

/// True when a `-c` option is present, whether or not a script follows.
pub fn has_dash_c(tokens: &[String]) -> bool {
    dash_c_position(tokens).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::tokenize;

    #[test]
    fn test_dash_c_script() {
        assert_eq!(dash_c_script(&tokenize("bash -c 'git status'")), Some("git status"));
        assert_eq!(dash_c_script(&tokenize("sh -lc 'ls'")), Some("ls"));
        assert_eq!(dash_c_script(&tokenize("bash -euxc 'make'")), Some("make"));
        assert_eq!(dash_c_script(&tokenize("bash --norc -c 'ls'")), Some("ls"));
    }

    #[test]
    fn test_missing_script() {
        let tokens = tokenize("bash -c");
        assert_eq!(dash_c_script(&tokens), None);
        assert!(has_dash_c(&tokens));
    }

    #[test]
    fn test_not_dash_c() {
        assert!(!has_dash_c(&tokenize("bash script.sh")));
        assert!(!has_dash_c(&tokenize("bash -- -c")));
        assert!(!has_dash_c(&tokenize("bash -cat")));
    }

    #[test]
    fn test_reads_stdin() {
        assert!(shell_reads_stdin(&tokenize("bash")));
        assert!(shell_reads_stdin(&tokenize("sh -x")));
        assert!(shell_reads_stdin(&tokenize("bash -s arg1 arg2")));
        assert!(shell_reads_stdin(&tokenize("bash -o pipefail -")));
        assert!(shell_reads_stdin(&tokenize("zsh --norc")));
        assert!(!shell_reads_stdin(&tokenize("bash script.sh")));
        assert!(!shell_reads_stdin(&tokenize("bash -- script.sh")));
        assert!(!shell_reads_stdin(&tokenize("bash -c 'ls'")));
    }

    #[test]
    fn test_is_shell() {
        assert!(is_shell("zsh"));
        assert!(!is_shell("python"));
    }
}
