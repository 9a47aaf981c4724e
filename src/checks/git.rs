//! Git check: matches the normalised subcommand+flags operation string
//! against the policy's pattern lists, with `allowed` taking precedence over
//! `hard_blocked` (SPEC_FULL.md §8, "Git allow-vs-block precedence").

use crate::bash_parser::{git_subcommand_and_flags, ParsedCommand};
use crate::checks::{CheckResult, Context};
use crate::config::is_ci_environment;

pub fn check_command(ctx: &Context, cmds: &[ParsedCommand]) -> CheckResult {
    let Some(operation) = git_subcommand_and_flags(cmds) else {
        return CheckResult::allow();
    };
    let policy = &ctx.policy.git;

    let is_force_push = operation.starts_with("push") && (operation.contains("--force") || operation.contains("-f"));
    let has_safe_lease = operation.contains("--force-with-lease");

    // `allowed` wins over `hard_blocked` even when both match (e.g.
    // `push --force-with-lease` also contains the substring that a naive
    // `push --force` matcher would flag).
    if policy.allowed.iter().any(|p| operation_matches(p, &operation)) {
        return CheckResult::allow();
    }

    if is_ci_environment() && policy.ci_auto_allow.iter().any(|p| operation_matches(p, &operation)) {
        return CheckResult::allow();
    }

    if is_force_push && has_safe_lease {
        return CheckResult::allow();
    }

    if let Some(pattern) = policy.hard_blocked.iter().find(|p| operation_matches(p, &operation)) {
        return CheckResult::deny(
            "git",
            format!("git operation '{operation}' matches hard-blocked pattern '{pattern}'"),
            guidance_for(pattern),
        );
    }

    if let Some(pattern) = policy.confirm_required.iter().find(|p| operation_matches(p, &operation)) {
        return CheckResult::ask(
            "git",
            format!("git operation '{operation}' matches confirm-required pattern '{pattern}'"),
            "Ask the user to confirm and run this git operation themselves.",
        );
    }

    CheckResult::allow()
}

/// A pattern matches an operation string if every whitespace-separated token
/// in the pattern also appears as a token in the operation (so `push
/// --force` matches `push --force --no-verify` but not `push`).
fn operation_matches(pattern: &str, operation: &str) -> bool {
    let op_tokens: Vec<&str> = operation.split_whitespace().collect();
    pattern.split_whitespace().all(|tok| op_tokens.contains(&tok))
}

fn guidance_for(pattern: &str) -> String {
    if pattern.contains("push --force") || pattern.contains("push -f") {
        return "Use `git push --force-with-lease` instead, or ask the user to force-push themselves.".to_string();
    }
    if pattern.contains("reset --hard") {
        return "Ask the user to run `git reset --hard` themselves; it discards uncommitted work.".to_string();
    }
    if pattern.contains("clean -fdx") {
        return "Ask the user to confirm before deleting untracked files with `git clean`.".to_string();
    }
    if pattern.contains("branch -D") {
        return "Use `git branch -d` if the branch is merged, or ask the user to force-delete it themselves.".to_string();
    }
    "Ask the user to run this git operation themselves.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bash_parser::parse;
    use crate::policy::Policy;
    use std::path::PathBuf;

    fn ctx() -> Context {
        Context::new(Policy::default(), PathBuf::from("/project"), PathBuf::from("/project"))
    }

    #[test]
    fn force_push_denied() {
        let cmds = parse("git -C . push --force");
        let result = check_command(&ctx(), &cmds);
        assert!(!result.is_allow());
    }

    #[test]
    fn force_with_lease_allowed() {
        let cmds = parse("git push --force-with-lease");
        let result = check_command(&ctx(), &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn rebase_asks() {
        let cmds = parse("git rebase -i HEAD~3");
        let result = check_command(&ctx(), &cmds);
        assert!(!result.is_allow());
        assert_eq!(result.decision, crate::checks::Decision::Ask);
    }

    #[test]
    fn plain_status_allowed() {
        let cmds = parse("git status");
        let result = check_command(&ctx(), &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn non_git_command_allowed() {
        let cmds = parse("ls -la");
        let result = check_command(&ctx(), &cmds);
        assert!(result.is_allow());
    }

    #[test]
    fn clustered_clean_flags_denied_same_as_separated() {
        let clustered = parse("git clean -fdx");
        let separated = parse("git clean -f -d -x");
        assert!(!check_command(&ctx(), &clustered).is_allow());
        assert!(!check_command(&ctx(), &separated).is_allow());
    }
}
