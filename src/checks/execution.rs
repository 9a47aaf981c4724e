//! Execution check: a `chmod +x` is the one moment a downloaded file becomes
//! runnable, so this is where the guardian decides whether that file's
//! origin and contents justify it. Git-tracked files are exempt (they were
//! reviewed and committed by a human); anything the Download check recorded
//! in the ledger needs confirmation; anything else is sniffed for a binary
//! or script signature.

use std::path::Path;
use std::time::Duration;

use crate::bash_parser::ParsedCommand;
use crate::checks::{CheckResult, Context};
use crate::config::is_ci_environment;
use crate::ledger;
use crate::path_resolver::{is_git_tracked, resolve};
use crate::subprocess::run_with_timeout;

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(5);

pub fn check_command(ctx: &Context, cmds: &[ParsedCommand]) -> CheckResult {
    let Some(cmd) = cmds.iter().find(|c| c.command == "chmod") else {
        return CheckResult::allow();
    };

    if !adds_execute_bit(cmd) {
        return CheckResult::allow();
    }

    for arg in &cmd.args {
        if is_mode_token(arg) {
            continue;
        }
        let resolved = resolve(arg, &ctx.cwd);
        if let Some(result) = check_target(ctx, &resolved, arg) {
            return result;
        }
    }

    CheckResult::allow()
}

fn check_target(ctx: &Context, resolved: &Path, display_name: &str) -> Option<CheckResult> {
    let policy = &ctx.policy.download_protection;

    if policy.git_tracked_allow && (is_ci_environment() || is_git_tracked(resolved, &ctx.project_root)) {
        return None;
    }

    let canonical = resolved.display().to_string();
    if ledger::is_downloaded(&ctx.project_root, &policy.ledger_path, &canonical) {
        return Some(CheckResult::ask(
            "execution",
            format!("'{display_name}' was downloaded this session and is about to become executable"),
            "Ask the user to review the file's contents before granting execute permission.",
        ));
    }

    if policy.detect_binary_by_magic {
        if let Some(kind) = sniff_binary(ctx, resolved, policy.file_command_fallback) {
            return Some(CheckResult::ask(
                "execution",
                format!("'{display_name}' looks like a {kind} and is about to become executable"),
                "Ask the user to confirm they intend to run this binary.",
            ));
        }
    }

    None
}

fn adds_execute_bit(cmd: &ParsedCommand) -> bool {
    cmd.args.iter().any(|a| a.contains("+x"))
        || cmd.args.iter().any(|a| {
            !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()) && a.chars().any(|c| matches!(c, '1' | '3' | '5' | '7'))
        })
}

/// True for a `chmod` mode token — symbolic (`+x`, `u+x`, `go+x`, `ugo+x`,
/// `u-x`) or numeric (`755`, `0755`) — as opposed to a file-path target.
fn is_mode_token(token: &str) -> bool {
    if token.starts_with('+') || token.starts_with('-') {
        return true;
    }
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let mut chars = token.chars().peekable();
    while matches!(chars.peek(), Some('u') | Some('g') | Some('o') | Some('a')) {
        chars.next();
    }
    matches!(chars.peek(), Some('+') | Some('-') | Some('='))
}

/// Identify a binary by its magic bytes, preferring the `file -b` utility
/// (richer labels) and falling back to a raw byte-signature check when `file`
/// is unavailable or disabled.
fn sniff_binary(ctx: &Context, path: &Path, file_command_fallback: bool) -> Option<String> {
    if file_command_fallback {
        if let Ok(out) = run_with_timeout("file", &["-b", &path.display().to_string()], &ctx.cwd, SUBPROCESS_TIMEOUT) {
            if out.success {
                let desc = out.stdout.trim().to_lowercase();
                // "... text executable" is `file`'s label for a shebang script, not a
                // compiled binary - only the latter should prompt for confirmation.
                if !desc.contains("text") && (desc.contains("elf") || desc.contains("mach-o") || desc.contains("pe32") || desc.contains("executable")) {
                    return Some(out.stdout.trim().to_string());
                }
                return None;
            }
        }
    }

    sniff_binary_signature(path)
}

fn sniff_binary_signature(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.len() < 4 {
        return None;
    }
    if bytes.starts_with(b"\x7fELF") {
        return Some("ELF binary".to_string());
    }
    if bytes.starts_with(b"MZ") {
        return Some("PE/Windows executable".to_string());
    }
    if bytes.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || bytes.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || bytes.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || bytes.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
        || bytes.starts_with(&[0xCA, 0xFE, 0xBA, 0xBE])
    {
        return Some("Mach-O binary".to_string());
    }
    None
}
