//! Directory check: the primary project-boundary enforcement. Every other
//! path-aware check (Secrets, Deletion, Unpack) assumes Directory has already
//! run first in the handler's declared order.

use crate::bash_parser::{extract_paths, ParsedCommand};
use crate::checks::{CheckResult, Context, Operation};
use crate::path_resolver::{is_symlink_escape, is_within, resolve};

/// Commands whose arguments never denote a path the Directory check should
/// chase — matches `bash_parser::PATH_OPAQUE_COMMANDS` but kept local since
/// Directory's notion of "opaque" is the check's own policy, not the
/// parser's.
fn command_has_no_paths(command: &str) -> bool {
    crate::bash_parser::PATH_OPAQUE_COMMANDS.contains(&command)
}

/// Evaluate a single candidate path against the project boundary.
pub fn check_path(ctx: &Context, raw_path: &str, operation: Operation) -> CheckResult {
    if is_symlink_escape(raw_path, &ctx.project_root, &ctx.cwd) {
        return CheckResult::deny(
            "directory",
            format!("'{raw_path}' is a symlink that escapes the project root"),
            "This path resolves outside the project via a symlink. Ask the user to confirm this operation manually.",
        );
    }

    let resolved = resolve(raw_path, &ctx.cwd);
    if !is_within(&resolved, &ctx.allowed_roots) {
        return CheckResult::deny(
            "directory",
            format!(
                "{} target '{}' resolves outside the project root ({})",
                operation.as_str(),
                raw_path,
                resolved.display()
            ),
            format!(
                "Ask the user to run this `{}` themselves if it needs to touch a path outside the project.",
                operation.as_str()
            ),
        );
    }

    CheckResult::allow()
}

/// Evaluate every `ParsedCommand` in a bash invocation: candidate paths are
/// collected per-command via `extract_paths` (which already applies the
/// pattern-first-arg / bare-token rules) and each is run through
/// `check_path` with an operation tag derived from the command name.
pub fn check_command(ctx: &Context, cmds: &[ParsedCommand]) -> CheckResult {
    for cmd in cmds {
        if command_has_no_paths(&cmd.command) && cmd.redirects.is_empty() {
            continue;
        }
        let operation = operation_for(&cmd.command);
        for path in extract_paths(cmd) {
            let result = check_path(ctx, &path, operation);
            if !result.is_allow() {
                return result;
            }
        }
    }
    CheckResult::allow()
}

fn operation_for(command: &str) -> Operation {
    match command {
        "rm" | "rmdir" | "unlink" | "shred" => Operation::Rm,
        "cp" => Operation::Cp,
        "mv" => Operation::Mv,
        "cat" | "less" | "more" | "head" | "tail" | "grep" | "rg" => Operation::Read,
        _ => Operation::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bash_parser::parse;
    use crate::policy::Policy;
    use tempfile::tempdir;

    fn ctx_for(root: &std::path::Path) -> Context {
        Context::new(Policy::default(), root.to_path_buf(), root.to_path_buf())
    }

    #[test]
    fn rejects_absolute_path_outside_project() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("rm -rf /etc/passwd");
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow());
    }

    #[test]
    fn allows_path_within_project() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("cat a.txt");
        let result = check_command(&ctx, &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn skips_first_arg_for_pattern_first_commands() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("grep /etc/passwd README.md");
        let result = check_command(&ctx, &cmds);
        assert!(result.is_allow(), "the pattern argument must not be treated as a path");
    }

    #[test]
    fn opaque_commands_are_skipped() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("echo /etc/passwd");
        let result = check_command(&ctx, &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn command_substitution_surfacing_out_of_project_rm_is_denied() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("echo $(rm -rf ../outside)");
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow(), "the rm surfaced from the substitution must still be checked");
    }
}
