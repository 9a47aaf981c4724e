//! Unpack check: archive-extraction tools can be steered to write outside
//! the project via their destination-directory flag; this check extracts
//! that target and holds it to the same boundary as any other write.

use regex::Regex;

use crate::bash_parser::ParsedCommand;
use crate::checks::{CheckResult, Context};
use crate::path_resolver::{lexical_normalize, resolve};

const UNPACK_COMMANDS: &[&str] = &[
    "tar", "bsdtar", "unzip", "unrar", "7z", "7za", "gunzip", "bunzip2", "unxz",
];

pub fn check_command(ctx: &Context, raw: &str, cmds: &[ParsedCommand]) -> CheckResult {
    let Some(cmd) = cmds.iter().find(|c| UNPACK_COMMANDS.contains(&c.command.as_str())) else {
        return CheckResult::allow();
    };

    if Regex::new(r"bsdtar\s+.*-s\b").unwrap().is_match(raw) {
        return CheckResult::deny(
            "unpack",
            "'bsdtar -s' rewrites extracted paths, defeating traversal checks",
            "Ask the user to run this extraction themselves.",
        );
    }

    for pattern in &ctx.policy.unpack_protection.blocked_patterns {
        if Regex::new(pattern).map(|re| re.is_match(raw)).unwrap_or(false) {
            return CheckResult::ask(
                "unpack",
                format!("command matches a blocked unpack pattern ('{pattern}')"),
                "Ask the user to confirm this extraction target.",
            );
        }
    }

    let Some(target) = extract_target_dir(cmd, raw) else {
        return CheckResult::allow();
    };

    if ctx.policy.unpack_protection.check_archive_path_traversal {
        let lexical = lexical_normalize(std::path::Path::new(&target));
        if lexical.starts_with("..") {
            return CheckResult::deny(
                "unpack",
                format!("extraction target '{target}' escapes upward via '..'"),
                "Ask the user to pick a destination inside the project.",
            );
        }
    }

    let resolved = resolve(&target, &ctx.cwd);
    if !crate::path_resolver::is_within(&resolved, &ctx.allowed_roots) {
        return CheckResult::ask(
            "unpack",
            format!("extraction target '{target}' resolves outside the project"),
            "Ask the user to confirm this extraction destination.",
        );
    }

    CheckResult::allow()
}

fn extract_target_dir(cmd: &ParsedCommand, raw: &str) -> Option<String> {
    match cmd.command.as_str() {
        "tar" | "bsdtar" => find_flag_value(cmd, &["-C", "--directory", "--one-top-level"]),
        "unzip" => find_flag_value(cmd, &["-d"]),
        "7z" | "7za" => cmd.flags.iter().find_map(|f| f.strip_prefix("-o").map(str::to_string)),
        _ => {
            if raw.contains("zipfile") || raw.contains("tarfile") {
                find_python_extract_dir(raw)
            } else {
                None
            }
        }
    }
}

/// Look up a flag that takes its value as the *next* token on the raw
/// command line (`-C /tmp`) as well as the `=`-attached form
/// (`--directory=/tmp`).
fn find_flag_value(cmd: &ParsedCommand, names: &[&str]) -> Option<String> {
    for flag in &cmd.flags {
        if let Some((name, value)) = flag.split_once('=') {
            if names.contains(&name) {
                return Some(value.to_string());
            }
        }
    }
    let tokens: Vec<&str> = cmd.raw.split_whitespace().collect();
    for (i, tok) in tokens.iter().enumerate() {
        if names.contains(tok) {
            return tokens.get(i + 1).map(|s| s.to_string());
        }
    }
    None
}

/// `python -c "import zipfile; zipfile.ZipFile('a.zip').extractall('/tmp/x')"`
/// style inline extraction — pull the first string literal following
/// `extractall(`/`-e` as a best-effort destination.
fn find_python_extract_dir(raw: &str) -> Option<String> {
    let re = Regex::new(r#"extractall\(['"]([^'"]+)['"]"#).ok()?;
    re.captures(raw).map(|c| c[1].to_string())
}
