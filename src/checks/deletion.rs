//! Deletion check: runs *after* Directory, so every target reaching this
//! check is already known to be in-project. Flags recursive deletions that
//! are dangerously broad (glob-only target) or that touch a protected path.

use crate::bash_parser::ParsedCommand;
use crate::checks::{CheckResult, Context};
use crate::path_resolver::resolve;

const DELETION_COMMANDS: &[&str] = &["rm", "rmdir", "unlink", "shred"];

pub fn check_command(ctx: &Context, cmds: &[ParsedCommand]) -> CheckResult {
    let Some(cmd) = cmds.iter().find(|c| DELETION_COMMANDS.contains(&c.command.as_str())) else {
        return CheckResult::allow();
    };

    let recursive = is_recursive(cmd);

    if recursive && cmd.args.iter().any(|a| is_glob_only(a)) {
        return CheckResult::ask(
            "deletion",
            "recursive delete with a glob-only target (e.g. `rm -rf *`)",
            "Ask the user to confirm this broad deletion themselves.",
        );
    }

    for arg in &cmd.args {
        let resolved = resolve(arg, &ctx.cwd);

        if resolved == ctx.project_root {
            return CheckResult::ask(
                "deletion",
                "target is the project root itself",
                "Ask the user to confirm deleting the project root.",
            );
        }

        if is_protected_or_ancestor(ctx, &resolved) {
            return CheckResult::ask(
                "deletion",
                format!("'{arg}' is, or is an ancestor of, a protected path"),
                "Ask the user to confirm this deletion themselves.",
            );
        }
    }

    CheckResult::allow()
}

fn is_recursive(cmd: &ParsedCommand) -> bool {
    cmd.flags.iter().any(|f| {
        f == "-r" || f == "-R" || f == "--recursive" || (f.starts_with('-') && !f.starts_with("--") && (f.contains('r') || f.contains('R')))
    })
}

fn is_glob_only(arg: &str) -> bool {
    matches!(arg, "*" | "./*" | "**" | "./**")
}

fn is_protected_or_ancestor(ctx: &Context, resolved: &std::path::Path) -> bool {
    if resolved.ends_with(".git") {
        return true;
    }
    let Ok(rel) = resolved.strip_prefix(&ctx.project_root) else {
        return false;
    };
    for pattern in &ctx.policy.protected_paths.no_modify {
        let stripped = strip_glob_suffix(pattern);
        let protected_rel = stripped.trim_start_matches("**/").trim_start_matches('/');
        if protected_rel.is_empty() {
            continue;
        }
        let protected_path = std::path::Path::new(protected_rel);
        if rel == protected_path || rel.starts_with(protected_path) || protected_path.starts_with(rel) {
            return true;
        }
    }
    false
}

/// Strip a trailing glob component (`/**`, `/*`) so the remainder can be
/// compared as a literal path prefix.
fn strip_glob_suffix(pattern: &str) -> String {
    pattern.trim_end_matches("/**").trim_end_matches("/*").to_string()
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
    fn recursive_glob_only_asks() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let cmds = parse("rm -rf *");
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow());
    }

    #[test]
    fn deleting_git_dir_asks() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join(".git")).unwrap();
        let ctx = ctx_for(&root);
        let cmds = parse("rm -rf .git");
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow());
    }

    #[test]
    fn ordinary_file_delete_allowed() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("scratch.txt"), "x").unwrap();
        let ctx = ctx_for(&root);
        let cmds = parse("rm scratch.txt");
        let result = check_command(&ctx, &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn deleting_project_root_asks() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let ctx = ctx_for(&root);
        let cmds = parse(&format!("rm -rf {}", root.display()));
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow());
    }
}
