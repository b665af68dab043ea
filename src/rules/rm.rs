//! rm command analysis.
//!
//! `rm` only matters with both a recursive and a force flag. Each target is
//! resolved lexically against the effective working directory; anything that
//! cannot be resolved is treated as outside it.

use super::has_recursive_force;
use crate::decision::Decision;

pub const REASON_ROOT_OR_HOME: &str =
    "rm -rf targeting the filesystem root or home directory is extremely dangerous.";
pub const REASON_CWD_IS_HOME: &str =
    "rm -rf while cwd is $HOME is blocked. cd into a project directory first.";
pub const REASON_CWD_ITSELF: &str =
    "rm -rf on the current working directory itself is blocked. Delete its contents from the parent instead.";
pub const REASON_OUTSIDE_CWD: &str =
    "rm -rf outside the current working directory is blocked. Use explicit paths inside the project.";
pub const REASON_PARANOID: &str =
    "rm -rf is blocked in paranoid mode. [paranoid mode - disable with: unset SAFETY_NET_PARANOID SAFETY_NET_PARANOID_RM]";

/// Directories where recursive deletion is always acceptable.
const TEMP_ROOTS: &[&str] = &["/tmp", "/var/tmp"];

/// Where an `rm` runs and how strictly it is judged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmScope<'a> {
    /// Effective working directory; `None` when unknown.
    pub cwd: Option<&'a str>,
    pub home: Option<&'a str>,
    /// Value of `$TMPDIR` in the hook's environment.
    pub tmpdir: Option<&'a str>,
    /// Whether `$TMPDIR` counts as a temp location for this segment.
    pub allow_tmpdir_var: bool,
    pub paranoid: bool,
}

/// Analyze an rm command (`tokens[0]` is `rm`).
pub fn analyze_rm(tokens: &[String], scope: &RmScope<'_>) -> Decision {
    let args = tokens.get(1..).unwrap_or_default();
    if !has_recursive_force(args) {
        return Decision::allow();
    }

    for target in targets(args) {
        if let Some(reason) = check_target(target, scope) {
            return Decision::block(rule_for(reason), reason);
        }
    }
    Decision::allow()
}

fn rule_for(reason: &'static str) -> &'static str {
    match reason {
        REASON_ROOT_OR_HOME => "rm.root_or_home",
        REASON_CWD_IS_HOME => "rm.cwd_home",
        REASON_CWD_ITSELF => "rm.cwd",
        REASON_PARANOID => "rm.paranoid",
        _ => "rm.outside_cwd",
    }
}

/// Non-option arguments, plus everything after `--`.
fn targets(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut after_separator = false;
    for arg in args {
        if after_separator {
            out.push(arg.as_str());
        } else if arg == "--" {
            after_separator = true;
        } else if arg == "-" || !arg.starts_with('-') {
            out.push(arg.as_str());
        }
    }
    out
}

/// A target resolved to an absolute, normalized path.
enum Resolved {
    /// A literal home or root reference (`~`, `$HOME`, `/`).
    RootOrHome,
    /// Under a temp root; always absolute.
    Temp(String),
    Path { path: String, relative: bool },
    /// Depends on expansion we cannot perform.
    Unknown,
}

fn check_target(raw: &str, scope: &RmScope<'_>) -> Option<&'static str> {
    if raw.is_empty() {
        return None;
    }

    let cwd = scope.cwd.map(normalize);
    let home = scope.home.map(normalize);

    let (path, relative) = match resolve(raw, scope) {
        Resolved::RootOrHome => return Some(REASON_ROOT_OR_HOME),
        Resolved::Unknown => return Some(REASON_OUTSIDE_CWD),
        Resolved::Temp(path) => {
            return (cwd.as_deref() == Some(path.as_str())).then_some(REASON_CWD_ITSELF);
        }
        Resolved::Path { path, relative } => (path, relative),
    };

    if path == "/" || (!relative && home.as_deref() == Some(path.as_str())) {
        return Some(REASON_ROOT_OR_HOME);
    }
    if !relative && is_temp(&path, scope) {
        return (cwd.as_deref() == Some(path.as_str())).then_some(REASON_CWD_ITSELF);
    }

    let Some(cwd) = cwd else {
        return Some(REASON_OUTSIDE_CWD);
    };
    if home.as_deref() == Some(cwd.as_str()) {
        return Some(REASON_CWD_IS_HOME);
    }
    if home.as_deref() == Some(path.as_str()) {
        return Some(REASON_ROOT_OR_HOME);
    }
    if path == cwd {
        return Some(REASON_CWD_ITSELF);
    }
    if !is_within(&path, &cwd) {
        return Some(REASON_OUTSIDE_CWD);
    }
    scope.paranoid.then_some(REASON_PARANOID)
}

fn resolve(raw: &str, scope: &RmScope<'_>) -> Resolved {
    if matches!(raw, "~" | "~/" | "$HOME" | "$HOME/" | "${HOME}" | "${HOME}/") {
        return Resolved::RootOrHome;
    }

    if let Some(rest) = strip_var(raw, "HOME").or_else(|| raw.strip_prefix("~/")) {
        return match scope.home {
            Some(home) => absolute(&join(home, rest), false),
            None => Resolved::Unknown,
        };
    }
    if let Some(rest) = strip_var(raw, "TMPDIR") {
        return resolve_tmpdir(rest, scope);
    }
    if let Some(rest) = strip_var(raw, "PWD") {
        return match scope.cwd {
            Some(cwd) => absolute(&join(cwd, rest), true),
            None => Resolved::Unknown,
        };
    }
    if raw.starts_with('~') || raw.contains('$') || raw.contains('`') {
        return Resolved::Unknown;
    }
    if raw.starts_with('/') {
        return absolute(raw, false);
    }
    match scope.cwd {
        Some(cwd) => absolute(&join(cwd, raw), true),
        None => Resolved::Unknown,
    }
}

fn absolute(path: &str, relative: bool) -> Resolved {
    Resolved::Path {
        path: normalize(path),
        relative,
    }
}

fn resolve_tmpdir(rest: &str, scope: &RmScope<'_>) -> Resolved {
    if !scope.allow_tmpdir_var || escapes(rest) {
        return Resolved::Unknown;
    }
    match scope.tmpdir {
        Some(tmpdir) if tmpdir.starts_with('/') && normalize(tmpdir) != "/" => {
            Resolved::Temp(normalize(&join(tmpdir, rest)))
        }
        // The variable is set at runtime; it is a temp dir either way.
        _ => Resolved::Temp(format!("$TMPDIR/{}", rest.trim_start_matches('/'))),
    }
}

/// Strip a leading `$NAME` or `${NAME}` that ends at `/` or end of string.
fn strip_var<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let rest = raw
        .strip_prefix('$')
        .and_then(|r| r.strip_prefix(name))
        .or_else(|| {
            raw.strip_prefix("${")
                .and_then(|r| r.strip_prefix(name))
                .and_then(|r| r.strip_prefix('}'))
        })?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn is_temp(path: &str, scope: &RmScope<'_>) -> bool {
    if TEMP_ROOTS.iter().any(|root| is_within(path, root)) {
        return true;
    }
    scope.allow_tmpdir_var
        && scope
            .tmpdir
            .filter(|t| t.starts_with('/'))
            .map(normalize)
            .is_some_and(|tmpdir| tmpdir != "/" && is_within(path, &tmpdir))
}

/// True when `dir` is `/tmp`, `/var/tmp` or a directory below them.
pub fn is_temp_dir(dir: &str) -> bool {
    dir.starts_with('/') && {
        let dir = normalize(dir);
        TEMP_ROOTS.iter().any(|root| is_within(&dir, root))
    }
}

fn join(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest.trim_start_matches('/'))
}

/// Collapse `.`, `..` and repeated slashes of an absolute path.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// True when a relative path climbs above its starting directory.
fn escapes(rest: &str) -> bool {
    let mut depth = 0i32;
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => depth += 1,
        }
    }
    false
}

fn is_within(path: &str, dir: &str) -> bool {
    dir == "/"
        || path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::segment;

    const HOME: &str = "/home/dev";

    fn scope(cwd: Option<&'static str>) -> RmScope<'static> {
        RmScope {
            cwd,
            home: Some(HOME),
            tmpdir: None,
            allow_tmpdir_var: true,
            paranoid: false,
        }
    }

    fn check_in(command: &str, scope: &RmScope<'_>) -> Decision {
        let tokens = segment(command).pop().map(|s| s.tokens).unwrap_or_default();
        analyze_rm(&tokens, scope)
    }

    fn reason(command: &str, cwd: Option<&'static str>) -> Option<String> {
        check_in(command, &scope(cwd)).into_result().map(|r| r.reason)
    }

    #[test]
    fn test_requires_recursive_and_force() {
        assert_eq!(reason("rm -r /", None), None);
        assert_eq!(reason("rm -f /etc/passwd", None), None);
        assert_eq!(reason("rm file.txt", None), None);
    }

    #[test]
    fn test_root_and_home() {
        for command in ["rm -rf /", "rm -rf ~", "rm -rf ~/", "rm -rf $HOME", "rm -rf ${HOME}", "rm -rf /home/dev"] {
            assert_eq!(reason(command, Some("/home/dev/proj")).as_deref(), Some(REASON_ROOT_OR_HOME), "{command}");
        }
        assert_eq!(reason("rm -rf /usr/..", None).as_deref(), Some(REASON_ROOT_OR_HOME));
    }

    #[test]
    fn test_every_reason_names_rm_rf() {
        for r in [REASON_ROOT_OR_HOME, REASON_CWD_IS_HOME, REASON_CWD_ITSELF, REASON_OUTSIDE_CWD, REASON_PARANOID] {
            assert!(r.contains("rm -rf"));
        }
        assert!(REASON_ROOT_OR_HOME.contains("root or home"));
        assert!(REASON_CWD_IS_HOME.contains("cwd is $HOME"));
    }

    #[test]
    fn test_temp_paths_allowed() {
        assert_eq!(reason("rm -rf /tmp/build-cache", None), None);
        assert_eq!(reason("rm -rf /var/tmp/x", Some("/home/dev/proj")), None);
        assert_eq!(reason("rm -rf $TMPDIR/x", None), None);
        assert_eq!(reason("rm -rf ${TMPDIR}/x", None), None);
    }

    #[test]
    fn test_temp_escape_blocked() {
        assert_eq!(reason("rm -rf /tmp/../Users/some/path", None).as_deref(), Some(REASON_OUTSIDE_CWD));
        assert_eq!(reason("rm -rf $TMPDIR/../escape", None).as_deref(), Some(REASON_OUTSIDE_CWD));
    }

    #[test]
    fn test_temp_root_itself_allowed() {
        assert_eq!(reason("rm -rf /tmp", None), None);
        assert_eq!(reason("rm -rf /var/tmp/", Some("/home/dev/proj")), None);
        assert_eq!(reason("rm -rf /tmp", Some("/tmp")).as_deref(), Some(REASON_CWD_ITSELF));
    }

    #[test]
    fn test_temp_path_equal_to_cwd() {
        assert_eq!(reason("rm -rf /tmp/work", Some("/tmp/work")).as_deref(), Some(REASON_CWD_ITSELF));
        assert_eq!(reason("rm -rf /tmp/work/sub", Some("/tmp/work")), None);
    }

    #[test]
    fn test_tmpdir_override_disables_tmpdir() {
        let mut s = scope(None);
        s.allow_tmpdir_var = false;
        assert!(check_in("rm -rf $TMPDIR/x", &s).is_blocked());
        assert!(!check_in("rm -rf /tmp/x", &s).is_blocked());
    }

    #[test]
    fn test_tmpdir_value_counts_as_temp() {
        let mut s = scope(None);
        s.tmpdir = Some("/private/var/folders/xy/T/");
        assert!(!check_in("rm -rf /private/var/folders/xy/T/build", &s).is_blocked());
        assert!(!check_in("rm -rf $TMPDIR/build", &s).is_blocked());
    }

    #[test]
    fn test_inside_cwd_allowed() {
        let cwd = Some("/home/dev/proj");
        assert_eq!(reason("rm -rf build", cwd), None);
        assert_eq!(reason("rm -rf ./dist node_modules", cwd), None);
        assert_eq!(reason("rm -rf /home/dev/proj/target", cwd), None);
        assert_eq!(reason("rm -rf $PWD/out", cwd), None);
        assert_eq!(reason("rm -rf -- -weird-name", cwd), None);
    }

    #[test]
    fn test_outside_cwd_blocked() {
        let cwd = Some("/home/dev/proj");
        assert_eq!(reason("rm -rf ../other", cwd).as_deref(), Some(REASON_OUTSIDE_CWD));
        assert_eq!(reason("rm -rf /etc/nginx", cwd).as_deref(), Some(REASON_OUTSIDE_CWD));
        assert_eq!(reason("rm -rf /home/dev/projx", cwd).as_deref(), Some(REASON_OUTSIDE_CWD));
        assert_eq!(reason("rm -rf build ../x", cwd).as_deref(), Some(REASON_OUTSIDE_CWD));
    }

    #[test]
    fn test_relative_resolving_to_home() {
        assert_eq!(reason("rm -rf ..", Some("/home/dev/proj")).as_deref(), Some(REASON_ROOT_OR_HOME));
    }

    #[test]
    fn test_cwd_itself_blocked() {
        let cwd = Some("/home/dev/proj");
        assert_eq!(reason("rm -rf .", cwd).as_deref(), Some(REASON_CWD_ITSELF));
        assert_eq!(reason("rm -rf /home/dev/proj/", cwd).as_deref(), Some(REASON_CWD_ITSELF));
    }

    #[test]
    fn test_cwd_home_blocked() {
        assert_eq!(reason("rm -rf build", Some("/home/dev")).as_deref(), Some(REASON_CWD_IS_HOME));
    }

    #[test]
    fn test_unknown_cwd_blocks_relative() {
        assert_eq!(reason("rm -rf build", None).as_deref(), Some(REASON_OUTSIDE_CWD));
        assert_eq!(reason("rm -rf ~/projects", None).as_deref(), Some(REASON_OUTSIDE_CWD));
    }

    #[test]
    fn test_unresolvable_targets_blocked() {
        let cwd = Some("/home/dev/proj");
        for command in ["rm -rf $SOME_DIR", "rm -rf ~other/x", "rm -rf $(pwd)/x", "rm -rf `pwd`"] {
            assert_eq!(reason(command, cwd).as_deref(), Some(REASON_OUTSIDE_CWD), "{command}");
        }
    }

    #[test]
    fn test_paranoid_blocks_inside_cwd() {
        let mut s = scope(Some("/home/dev/proj"));
        s.paranoid = true;
        let d = check_in("rm -rf build", &s);
        assert_eq!(d.result().unwrap().reason, REASON_PARANOID);
        assert!(!check_in("rm -rf /tmp/x", &s).is_blocked());
    }

    #[test]
    fn test_flag_spellings() {
        let cwd = Some("/home/dev/proj");
        for command in ["rm -Rf /", "rm -r -f /", "rm --recursive --force /", "rm -fr /"] {
            assert!(reason(command, cwd).is_some(), "{command}");
        }
    }

    #[test]
    fn test_is_temp_dir() {
        assert!(is_temp_dir("/tmp"));
        assert!(is_temp_dir("/var/tmp/work/"));
        assert!(!is_temp_dir("/tmp/../Users"));
        assert!(!is_temp_dir("tmp"));
        assert!(!is_temp_dir("/tmpfoo"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/./b//c/../d"), "/a/b/d");
        assert_eq!(normalize("/.."), "/");
        assert!(escapes("/../x"));
        assert!(!escapes("/a/../b"));
    }
}
