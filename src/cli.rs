use clap::Parser;

/// toolguard - pre-tool-use security guardian for coding-assistant hosts
///
/// Reads a single `{ tool_name, tool_input }` envelope from stdin, classifies
/// it against the loaded policy, and writes a `{ permissionDecision, message }`
/// envelope to stdout when the decision is not allow. Always exits 0.
#[derive(Parser, Debug)]
#[command(name = "toolguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Override policy discovery with an explicit policy file path.
    #[arg(long, value_name = "PATH", env = "GUARDIAN_POLICY_FILE")]
    pub policy: Option<String>,

    /// Log verbosity passed to the tracing env filter (e.g. "debug", "info").
    /// Defaults to `RUST_LOG`, then `warn`.
    #[arg(long, value_name = "LEVEL", env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Supply the envelope directly as a JSON string instead of reading stdin.
    #[arg(long, value_name = "JSON")]
    pub once: Option<String>,
}
