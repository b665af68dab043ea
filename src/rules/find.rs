//! find command analysis.

use super::{command_name, has_recursive_force, unwrap_busybox};
use crate::decision::Decision;
use crate::shell::strip_wrappers;

pub const REASON_FIND_DELETE: &str = "find -delete permanently removes files matching the criteria. Use find -print first to verify targets.";
pub const REASON_FIND_EXEC_RM: &str = "find -exec rm -rf runs destructive deletion on matched files. Use find -print first to verify targets.";

/// Primaries whose next token is a value, never an action.
const CONSUMES_ONE: &[&str] = &[
    "-name",
    "-iname",
    "-path",
    "-ipath",
    "-wholename",
    "-iwholename",
    "-regex",
    "-iregex",
    "-lname",
    "-ilname",
    "-samefile",
    "-newer",
    "-newerxy",
    "-type",
    "-xtype",
    "-user",
    "-group",
    "-perm",
    "-size",
    "-mtime",
    "-mmin",
    "-ctime",
    "-cmin",
    "-atime",
    "-amin",
    "-printf",
    "-fprint",
    "-fprint0",
    "-fprintf",
    "-fls",
];

const EXEC_LIKE: &[&str] = &["-exec", "-execdir", "-ok", "-okdir"];

/// Analyze the arguments of a `find` command (everything after `find`).
pub fn analyze_find(args: &[String]) -> Decision {
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        let primary = arg.to_ascii_lowercase();

        if EXEC_LIKE.contains(&primary.as_str()) {
            let start = i + 1;
            let end = args[start..]
                .iter()
                .position(|t| t == ";" || t == "+")
                .map_or(args.len(), |p| start + p);
            if exec_runs_rm_rf(&args[start..end]) {
                return Decision::block("find.exec_rm", REASON_FIND_EXEC_RM);
            }
            i = end + 1;
            continue;
        }

        if CONSUMES_ONE.contains(&primary.as_str()) {
            i += 2;
            continue;
        }
        if primary == "-delete" {
            return Decision::block("find.delete", REASON_FIND_DELETE);
        }
        i += 1;
    }
    Decision::allow()
}

fn exec_runs_rm_rf(command: &[String]) -> bool {
    let stripped = strip_wrappers(command).tokens;
    let Some((head, args)) = unwrap_busybox(&stripped).split_first() else {
        return false;
    };
    command_name(head) == "rm" && has_recursive_force(args)
}
