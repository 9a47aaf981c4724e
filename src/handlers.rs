//! Tool handlers: one function per recognised `tool_name`, each composing
//! the Check Library in the fixed order SPEC_FULL.md §4.4 prescribes and
//! extracting its own inputs from the `tool_input` JSON map by slot name
//! rather than by source shape.

use std::collections::HashMap;

use serde_json::Value;

use crate::bash_parser::parse;
use crate::checks::{self, CheckResult, Context};

/// Script-looking file extensions, used by Write/Edit to decide whether
/// CodeContent should inspect the incoming content.
const SCRIPT_EXTENSIONS: &[&str] = &[".py", ".sh", ".bash", ".rb", ".pl", ".js", ".ts", ".rs", ".go"];

pub fn dispatch(ctx: &Context, tool_name: &str, tool_input: &HashMap<String, Value>) -> CheckResult {
    match tool_name {
        "Bash" => bash(ctx, tool_input),
        "Read" => read(ctx, tool_input),
        "Write" => write(ctx, tool_input),
        "Edit" => write(ctx, tool_input),
        "NotebookEdit" => notebook_edit(ctx, tool_input),
        "Glob" => glob_or_grep(ctx, tool_input),
        "Grep" => glob_or_grep(ctx, tool_input),
        _ => CheckResult::allow(),
    }
}

fn str_input<'a>(tool_input: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    tool_input.get(key).and_then(Value::as_str)
}

fn bash(ctx: &Context, tool_input: &HashMap<String, Value>) -> CheckResult {
    let Some(command) = str_input(tool_input, "command") else {
        return CheckResult::allow();
    };

    let cmds = parse(command);

    macro_rules! run {
        ($check:expr) => {
            let result = $check;
            if !result.is_allow() {
                return result;
            }
        };
    }

    run!(checks::bypass::check_command(ctx, command, &cmds));
    run!(checks::directory::check_command(ctx, &cmds));
    run!(checks::unpack::check_command(ctx, command, &cmds));
    run!(checks::git::check_command(ctx, &cmds));
    run!(checks::deletion::check_command(ctx, &cmds));
    run!(checks::download::check_command(ctx, &cmds));
    run!(checks::execution::check_command(ctx, &cmds));
    run!(checks::secrets::check_command(ctx, &cmds));

    for path in executed_script_paths(&cmds) {
        let resolved = crate::path_resolver::resolve(&path, &ctx.cwd);
        if let Ok(content) = std::fs::read_to_string(&resolved) {
            let result = checks::codecontent::check(ctx, &content, &path);
            if !result.is_allow() {
                return result;
            }
        }
    }

    CheckResult::allow()
}

/// Scripts a bash invocation hands to an interpreter directly, e.g.
/// `python3 script.py` or `./run.sh` — candidates for a CodeContent pass.
fn executed_script_paths(cmds: &[crate::bash_parser::ParsedCommand]) -> Vec<String> {
    const INTERPRETERS: &[&str] = &["python", "python3", "ruby", "perl", "node", "bash", "sh"];
    let mut out = Vec::new();
    for cmd in cmds {
        if looks_like_script(&cmd.command) {
            out.push(cmd.command.clone());
        }
        if INTERPRETERS.contains(&cmd.command.as_str()) {
            if let Some(first) = cmd.args.iter().find(|a| looks_like_script(a)) {
                out.push(first.clone());
            }
        }
    }
    out
}

fn looks_like_script(token: &str) -> bool {
    SCRIPT_EXTENSIONS.iter().any(|ext| token.ends_with(ext))
}

fn read(ctx: &Context, tool_input: &HashMap<String, Value>) -> CheckResult {
    let Some(path) = str_input(tool_input, "file_path") else {
        return CheckResult::allow();
    };
    let result = checks::directory::check_path(ctx, path, checks::Operation::Read);
    if !result.is_allow() {
        return result;
    }
    checks::secrets::check_path(ctx, path, false)
}

fn write(ctx: &Context, tool_input: &HashMap<String, Value>) -> CheckResult {
    let Some(path) = str_input(tool_input, "file_path") else {
        return CheckResult::allow();
    };

    let result = checks::directory::check_path(ctx, path, checks::Operation::Write);
    if !result.is_allow() {
        return result;
    }

    let result = checks::secrets::check_path(ctx, path, true);
    if !result.is_allow() {
        return result;
    }

    if looks_like_script(path) {
        if let Some(content) = str_input(tool_input, "content") {
            return checks::codecontent::check(ctx, content, path);
        }
    }

    CheckResult::allow()
}

fn notebook_edit(ctx: &Context, tool_input: &HashMap<String, Value>) -> CheckResult {
    let Some(path) = str_input(tool_input, "notebook_path") else {
        return CheckResult::allow();
    };

    let result = checks::directory::check_path(ctx, path, checks::Operation::Write);
    if !result.is_allow() {
        return result;
    }

    let result = checks::secrets::check_path(ctx, path, true);
    if !result.is_allow() {
        return result;
    }

    if str_input(tool_input, "cell_type") == Some("code") {
        if let Some(source) = str_input(tool_input, "new_source") {
            return checks::codecontent::check(ctx, source, path);
        }
    }

    CheckResult::allow()
}

fn glob_or_grep(ctx: &Context, tool_input: &HashMap<String, Value>) -> CheckResult {
    let path = str_input(tool_input, "path").filter(|p| !p.is_empty());
    let pattern = str_input(tool_input, "pattern");

    let effective_path = match path {
        Some(p) => Some(p.to_string()),
        None => pattern
            .filter(|p| p.starts_with('/') || p.starts_with('~') || p.starts_with("$HOME"))
            .map(|p| p.to_string()),
    };

    let Some(effective_path) = effective_path else {
        return CheckResult::allow();
    };

    let result = checks::directory::check_path(ctx, &effective_path, checks::Operation::Read);
    if !result.is_allow() {
        return result;
    }
    checks::secrets::check_path(ctx, &effective_path, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use serde_json::json;
    use tempfile::tempdir;

    fn ctx_for(root: &std::path::Path) -> Context {
        Context::new(Policy::default(), root.to_path_buf(), root.to_path_buf())
    }

    fn input(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn bash_rm_outside_project_denied() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let result = dispatch(&ctx, "Bash", &input(&[("command", json!("rm -rf /etc/passwd"))]));
        assert!(!result.is_allow());
    }

    #[test]
    fn read_env_denied() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join(".env"), "SECRET=1").unwrap();
        let ctx = ctx_for(&root);
        let result = dispatch(&ctx, "Read", &input(&[("file_path", json!(".env"))]));
        assert!(!result.is_allow());
    }

    #[test]
    fn grep_pattern_not_treated_as_path() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("README.md"), "hi").unwrap();
        let ctx = ctx_for(&root);
        let result = dispatch(&ctx, "Grep", &input(&[("pattern", json!(".env")), ("path", json!("README.md"))]));
        assert!(result.is_allow());
    }

    #[test]
    fn unknown_tool_allowed() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let result = dispatch(&ctx, "SomeFutureTool", &input(&[]));
        assert!(result.is_allow());
    }

    #[test]
    fn write_env_content_denied() {
        let dir = tempdir().unwrap();
        let ctx = ctx_for(&dir.path().canonicalize().unwrap());
        let result = dispatch(
            &ctx,
            "Write",
            &input(&[("file_path", json!(".env")), ("content", json!("SECRET=1"))]),
        );
        assert!(!result.is_allow());
    }
}
