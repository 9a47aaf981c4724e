//! Ambient logging: stderr-only structured output via `tracing`, so stdout
//! stays reserved for the decision envelope the host parses.
//!
//! Grounded in the teacher's `tracing`/`tracing-subscriber` dependency and
//! its env-gated `info_log!`/`is_quiet()` macro (`sandbox/log.rs`) — this
//! guardian replaces the ad hoc macro with a real `tracing_subscriber::fmt`
//! subscriber, since the host can already tune verbosity via `RUST_LOG`.

use std::collections::HashMap;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::checks::{CheckResult, Decision};
use crate::policy::LoggingPolicy;

/// Initialise the global subscriber once. `log_level` overrides `RUST_LOG`
/// when given; otherwise falls back to the env filter default of `warn`.
pub fn init(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Record the outcome of one decision, gated on `logging.enabled`. A
/// `debug`-level event additionally dumps the sanitised tool input when
/// `log_all_calls` is set; when `log_blocked_only` is set, an allow decision
/// is not logged at `info` at all.
pub fn record_decision(policy: &LoggingPolicy, tool_name: &str, tool_input: &HashMap<String, Value>, result: &CheckResult) {
    if !policy.enabled {
        return;
    }

    let decision_str = match result.decision {
        Decision::Allow => "allow",
        Decision::Ask => "ask",
        Decision::Deny => "deny",
    };

    let span = tracing::info_span!("decision", tool_name = tool_name, permission_decision = decision_str);
    let _enter = span.enter();

    if !policy.log_blocked_only || result.decision != Decision::Allow {
        tracing::info!(reason = result.reason.as_deref().unwrap_or(""), "decision made");
    }

    if policy.log_all_calls {
        let sanitised = sanitise_input(tool_input, policy.max_value_len);
        tracing::debug!(input = %sanitised, "full tool input");
    }
}

/// Truncate every value to `max_len` characters and mask anything shaped
/// like a secret-env-var assignment (`KEY=value` where `KEY` looks like a
/// secret name), matching the bash parser's own truncation texture.
fn sanitise_input(tool_input: &HashMap<String, Value>, max_len: usize) -> String {
    let mut parts = Vec::new();
    for (key, value) in tool_input {
        let rendered = match value {
            Value::String(s) => truncate(s, max_len),
            other => truncate(&other.to_string(), max_len),
        };
        let rendered = if looks_secret(key) { mask(&rendered) } else { rendered };
        parts.push(format!("{key}={rendered}"));
    }
    parts.sort();
    parts.join(", ")
}

fn truncate(value: &str, max_len: usize) -> String {
    let truncated: String = value.chars().take(max_len).collect();
    if truncated.len() < value.len() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

fn looks_secret(key: &str) -> bool {
    let upper = key.to_uppercase();
    upper.contains("SECRET") || upper.contains("TOKEN") || upper.contains("PASSWORD") || upper.contains("API_KEY")
}

fn mask(_value: &str) -> String {
    "***".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_values() {
        let long = "x".repeat(300);
        let out = truncate(&long, 200);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn truncate_leaves_short_values_untouched() {
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn secret_shaped_keys_detected() {
        assert!(looks_secret("AWS_SECRET_ACCESS_KEY"));
        assert!(looks_secret("api_key"));
        assert!(!looks_secret("file_path"));
    }
}
