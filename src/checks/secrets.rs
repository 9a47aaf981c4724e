//! Secrets check: runs after Directory, so every candidate here is already
//! known to be in-project. Blocks writes to configuration/credential files
//! the project never wants touched, and reads of file *content* that would
//! leak a credential into the assistant's context.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::bash_parser::{extract_paths, ParsedCommand};
use crate::checks::{CheckResult, Context};

const WRITE_COMMANDS: &[&str] = &["tee", "cp", "mv", "rm", "touch", "sed", "awk"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Bash entry point: classify each candidate path's command as a write or a
/// read and run it through `check_path`.
pub fn check_command(ctx: &Context, cmds: &[ParsedCommand]) -> CheckResult {
    for cmd in cmds {
        let is_write = is_write_command(cmd);
        for path in extract_paths(cmd) {
            let result = check_path(ctx, &path, is_write);
            if !result.is_allow() {
                return result;
            }
        }
        // extract_paths() folds redirects into the candidate list above using
        // the *command's* write/read classification, which misjudges a
        // redirect on an otherwise read-only command (`cat x > .bashrc`).
        // A redirect target is unconditionally a write regardless of command.
        if !cmd.redirects.is_empty() {
            for path in &cmd.redirects {
                let result = check_path(ctx, path, true);
                if !result.is_allow() {
                    return result;
                }
            }
        }
    }
    CheckResult::allow()
}

/// Direct entry point for the Read/Write/Edit/NotebookEdit/Glob/Grep
/// handlers, which already know their own operation.
pub fn check_path(ctx: &Context, raw_path: &str, is_write: bool) -> CheckResult {
    let resolved = crate::path_resolver::resolve(raw_path, &ctx.cwd);
    let Ok(rel) = resolved.strip_prefix(&ctx.project_root) else {
        return CheckResult::allow();
    };
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    let filename = resolved.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    if is_write {
        let protected = &ctx.policy.protected_paths;
        if path_matches_any(&protected.no_modify, &filename, &rel_str) {
            return CheckResult::deny(
                "secrets",
                format!("'{raw_path}' is a protected path and cannot be modified"),
                "Ask the user to edit this file themselves.",
            );
        }
        if path_matches_with_negation(&protected.no_read_content, &filename, &rel_str)
            || path_matches_any(&ctx.policy.sensitive_files.forbidden_read, &filename, &rel_str)
        {
            return CheckResult::deny(
                "secrets",
                format!("'{raw_path}' holds sensitive content and cannot be overwritten"),
                "Ask the user to edit this file themselves.",
            );
        }
        return CheckResult::allow();
    }

    let sensitive = &ctx.policy.sensitive_files;
    if path_matches_any(&sensitive.forbidden_read, &filename, &rel_str) {
        return CheckResult::deny(
            "secrets",
            format!("'{raw_path}' matches a forbidden-read pattern"),
            "Ask the user to share the specific value they need instead of reading the whole file.",
        );
    }

    if path_matches_with_negation(&ctx.policy.protected_paths.no_read_content, &filename, &rel_str) {
        let guidance = env_guidance(&resolved);
        return CheckResult::deny("secrets", format!("'{raw_path}' content cannot be read"), guidance);
    }

    CheckResult::allow()
}

fn env_guidance(resolved: &Path) -> String {
    if resolved.file_name().map(|n| n == ".env").unwrap_or(false) {
        let example = resolved.with_file_name(".env.example");
        if example.exists() {
            return "Read '.env.example' instead; it documents the expected keys without real values.".to_string();
        }
    }
    "Ask the user for the specific value instead of reading this file's contents.".to_string()
}

fn is_write_command(cmd: &ParsedCommand) -> bool {
    cmd.command == "echo" && !cmd.redirects.is_empty() || WRITE_COMMANDS.contains(&cmd.command.as_str())
}

fn path_matches_any(patterns: &[String], filename: &str, rel_path: &str) -> bool {
    patterns.iter().any(|p| glob_matches(p, filename, rel_path))
}

/// gitignore-style: later patterns override earlier ones, and a leading `!`
/// negates (explicit allow) rather than matches.
fn path_matches_with_negation(patterns: &[String], filename: &str, rel_path: &str) -> bool {
    let mut matched = false;
    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            if glob_matches(negated, filename, rel_path) {
                matched = false;
            }
        } else if glob_matches(pattern, filename, rel_path) {
            matched = true;
        }
    }
    matched
}

/// `rel_path` is matched with a synthetic leading `/` so gitignore-style
/// `**/foo` patterns anchor correctly against root-level files too — glob
/// syntax requires the literal `/` after `**` to actually be present, which
/// a bare relative path like `.ssh/id_rsa` otherwise lacks.
fn glob_matches(pattern: &str, filename: &str, rel_path: &str) -> bool {
    let Ok(compiled) = Pattern::new(pattern) else {
        return false;
    };
    let anchored = format!("/{rel_path}");
    compiled.matches_with(&anchored, MATCH_OPTIONS) || compiled.matches_with(filename, MATCH_OPTIONS)
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
    fn write_to_ssh_key_denied() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join(".ssh")).unwrap();
        let ctx = ctx_for(&root);
        let result = check_path(&ctx, ".ssh/authorized_keys", true);
        assert!(!result.is_allow());
    }

    #[test]
    fn read_env_denied_with_example_guidance() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join(".env"), "SECRET=1").unwrap();
        std::fs::write(root.join(".env.example"), "SECRET=").unwrap();
        let ctx = ctx_for(&root);
        let result = check_path(&ctx, ".env", false);
        assert!(!result.is_allow());
        assert!(result.guidance.unwrap().contains(".env.example"));
    }

    #[test]
    fn read_env_example_allowed_via_negation() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join(".env.example"), "SECRET=").unwrap();
        let ctx = ctx_for(&root);
        let result = check_path(&ctx, ".env.example", false);
        assert!(result.is_allow());
    }

    #[test]
    fn ordinary_file_read_allowed() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("README.md"), "hi").unwrap();
        let ctx = ctx_for(&root);
        let result = check_path(&ctx, "README.md", false);
        assert!(result.is_allow());
    }

    #[test]
    fn bash_redirect_into_bashrc_denied() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let ctx = ctx_for(&root);
        let cmds = parse("echo 'alias x=y' >> .bashrc");
        let result = check_command(&ctx, &cmds);
        assert!(!result.is_allow());
    }
}
