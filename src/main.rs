//! toolguard — pre-tool-use security guardian.
//!
//! Front door: reads one `{ tool_name, tool_input }` envelope, builds a
//! `checks::Context` from the discovered policy and project root, dispatches
//! to the matching tool handler, elevates an internal `ask` to `deny` at
//! this single boundary, and emits `{ permissionDecision, message }` only
//! when the decision is not allow. Never fails the process: every error
//! path (bad JSON, missing policy, handler panic-free bugs) degrades to
//! allow rather than surfacing a protocol error to the host, per
//! SPEC_FULL.md §7.

mod bash_parser;
mod checks;
mod cli;
mod config;
mod error;
mod handlers;
mod ledger;
mod observability;
mod path_resolver;
mod policy;
mod subprocess;

use std::collections::HashMap;
use std::io::Read;

use clap::Parser;
use serde::Serialize;
use serde_json::Value;

use checks::{CheckResult, Context, Decision};
use cli::Cli;

#[derive(Debug, Serialize)]
struct OutputEnvelope {
    #[serde(rename = "permissionDecision")]
    permission_decision: &'static str,
    message: String,
}

fn main() {
    let cli = Cli::parse();
    observability::init(cli.log_level.as_deref());

    let raw_envelope = match &cli.once {
        Some(json) => json.clone(),
        None => {
            let mut buf = String::new();
            if std::io::stdin().read_to_string(&mut buf).is_err() {
                return;
            }
            buf
        }
    };

    let Some((tool_name, tool_input)) = parse_envelope(&raw_envelope) else {
        tracing::debug!("envelope unreadable or malformed; allowing");
        return;
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let policy = config::load_policy(cli.policy.as_deref().map(std::path::Path::new), &cwd);
    let project_root = path_resolver::project_root(policy.directories.project_root.as_deref(), &cwd);

    let ctx = Context::new(policy, project_root, cwd);

    let result = handlers::dispatch(&ctx, &tool_name, &tool_input);
    observability::record_decision(&ctx.policy.logging, &tool_name, &tool_input, &result);

    emit(&result);
}

/// Parse the envelope into `(tool_name, tool_input)`. Any malformed shape —
/// unparsable JSON, missing `tool_name`, non-object `tool_input` — is treated
/// as "not observed", never as a protocol error.
fn parse_envelope(raw: &str) -> Option<(String, HashMap<String, Value>)> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let tool_name = value.get("tool_name")?.as_str()?.to_string();
    let tool_input = match value.get("tool_input") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => HashMap::new(),
    };
    Some((tool_name, tool_input))
}

/// Elevate `ask` to `deny` here, and only here (SPEC_FULL.md §9). Allow
/// produces no output at all.
fn emit(result: &CheckResult) {
    if result.is_allow() {
        return;
    }

    let permission_decision = match result.decision {
        Decision::Allow => return,
        Decision::Ask | Decision::Deny => "deny",
    };

    let message = format!(
        "{} [{}]: {}",
        result.reason.as_deref().unwrap_or("blocked by policy"),
        result.check_name,
        result.guidance.as_deref().unwrap_or("Ask the user to perform this action themselves."),
    );

    let envelope = OutputEnvelope { permission_decision, message };
    if let Ok(json) = serde_json::to_string(&envelope) {
        println!("{json}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_envelope_reads_bash_command() {
        let raw = r#"{"tool_name":"Bash","tool_input":{"command":"ls -la"}}"#;
        let (tool_name, tool_input) = parse_envelope(raw).unwrap();
        assert_eq!(tool_name, "Bash");
        assert_eq!(tool_input.get("command").and_then(Value::as_str), Some("ls -la"));
    }

    #[test]
    fn parse_envelope_rejects_malformed_json() {
        assert!(parse_envelope("not json").is_none());
    }

    #[test]
    fn parse_envelope_missing_tool_input_defaults_to_empty() {
        let raw = r#"{"tool_name":"Read"}"#;
        let (tool_name, tool_input) = parse_envelope(raw).unwrap();
        assert_eq!(tool_name, "Read");
        assert!(tool_input.is_empty());
    }

    #[test]
    fn ask_is_elevated_to_deny_at_emission() {
        let result = CheckResult::ask("bypass", "reason", "guidance");
        assert_eq!(result.decision, Decision::Ask);
        // `emit` only prints; verifying the mapping directly here guards the
        // one place that elevation is allowed to happen.
        let mapped = match result.decision {
            Decision::Ask | Decision::Deny => "deny",
            Decision::Allow => "allow",
        };
        assert_eq!(mapped, "deny");
    }
}
