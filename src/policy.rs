//! Canonical policy model — the single declarative configuration that drives
//! every check in the Check Library.
//!
//! Distinct from the teacher's sandbox runtime policy (Seatbelt/bwrap
//! translation, process denylists, network proxying): this is a pure
//! classification policy. Every field has a default so a missing or
//! malformed policy file degrades to safe built-in behaviour rather than
//! aborting (see error handling design, SPEC_FULL.md §7).

use serde::{Deserialize, Serialize};

/// A regex pattern paired with a human-readable description, used wherever
/// the policy needs to explain *why* a pattern matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedPattern {
    pub pattern: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesPolicy {
    /// Explicit project root; when absent the Path Resolver walks up from cwd
    /// looking for a `.git` marker.
    pub project_root: Option<String>,
    /// Additional roots a path may legally live under besides the project root.
    pub allowed_paths: Vec<String>,
}

impl Default for DirectoriesPolicy {
    fn default() -> Self {
        Self {
            project_root: None,
            allowed_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitPolicy {
    pub hard_blocked: Vec<String>,
    pub confirm_required: Vec<String>,
    pub allowed: Vec<String>,
    pub ci_auto_allow: Vec<String>,
}

impl Default for GitPolicy {
    fn default() -> Self {
        Self {
            hard_blocked: vec![
                "push --force".to_string(),
                "push -f".to_string(),
                "reset --hard".to_string(),
                "clean -f -d -x".to_string(),
                "branch -D".to_string(),
                "filter-branch".to_string(),
            ],
            confirm_required: vec![
                "rebase".to_string(),
                "checkout --".to_string(),
                "stash drop".to_string(),
                "tag -d".to_string(),
            ],
            allowed: vec!["push --force-with-lease".to_string()],
            ci_auto_allow: vec!["push --force-with-lease".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BypassPolicy {
    pub hard_blocked_commands: Vec<String>,
    pub shell_pipe_targets: Vec<String>,
    pub shell_exec_patterns: Vec<String>,
    pub interpreter_inline_patterns: Vec<String>,
    pub network_patterns: Vec<String>,
    pub obfuscation_patterns: Vec<String>,
    pub rce_patterns: Vec<String>,
    pub block_variable_as_command: bool,
}

impl Default for BypassPolicy {
    fn default() -> Self {
        Self {
            hard_blocked_commands: vec!["eval".to_string()],
            shell_pipe_targets: vec![
                "sh".to_string(),
                "bash".to_string(),
                "zsh".to_string(),
                "dash".to_string(),
                "ksh".to_string(),
            ],
            shell_exec_patterns: vec![
                r"\bsh\s+-c\b".to_string(),
                r"\bbash\s+-c\b".to_string(),
                r"\benv\s+-i\s+bash\b".to_string(),
                r"\bbusybox\s+sh\b".to_string(),
                r"\benv\s+(\S+=\S+\s+)*(sh|bash|zsh)\b".to_string(),
            ],
            interpreter_inline_patterns: vec![
                r"\bpython3?\s+-c\b".to_string(),
                r"\bperl\s+-e\b".to_string(),
                r"\bnode\s+-e\b".to_string(),
                r"\bruby\s+-e\b".to_string(),
            ],
            network_patterns: vec![
                r"https?://".to_string(),
                r"\bcurl\b".to_string(),
                r"\bwget\b".to_string(),
                r"socket\.".to_string(),
                r"requests\.".to_string(),
            ],
            obfuscation_patterns: vec![
                r"base64\s+-d".to_string(),
                r"\bfromCharCode\b".to_string(),
                r"\bunescape\(".to_string(),
                r"\bchr\(\d+\)".to_string(),
            ],
            rce_patterns: vec![
                r"\bexec\(".to_string(),
                r"\bsubprocess\.".to_string(),
                r"os\.system\(".to_string(),
            ],
            block_variable_as_command: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadPolicy {
    pub require_user_download: Vec<String>,
    pub auto_download_but_check_unpack: Vec<String>,
    pub auto_download: Vec<String>,
    pub block_pipe_to_shell: bool,
    pub track_downloaded_executables: bool,
    pub detect_binary_by_magic: bool,
    pub git_tracked_allow: bool,
    pub file_command_fallback: bool,
    /// Project-relative path to the downloaded-file ledger.
    pub ledger_path: String,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            require_user_download: vec![
                ".exe".to_string(),
                ".app".to_string(),
                ".dmg".to_string(),
                ".pkg".to_string(),
                ".deb".to_string(),
                ".bin".to_string(),
                ".msi".to_string(),
            ],
            auto_download_but_check_unpack: vec![
                ".tar".to_string(),
                ".tar.gz".to_string(),
                ".tgz".to_string(),
                ".zip".to_string(),
                ".7z".to_string(),
                ".rar".to_string(),
            ],
            auto_download: vec![
                ".json".to_string(),
                ".txt".to_string(),
                ".csv".to_string(),
                ".md".to_string(),
            ],
            block_pipe_to_shell: true,
            track_downloaded_executables: true,
            detect_binary_by_magic: true,
            git_tracked_allow: true,
            file_command_fallback: true,
            ledger_path: ".guardian/downloaded_files.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackPolicy {
    pub blocked_patterns: Vec<String>,
    pub check_archive_path_traversal: bool,
}

impl Default for UnpackPolicy {
    fn default() -> Self {
        Self {
            blocked_patterns: vec![
                r"tar\s+.*-C\s*\.\./".to_string(),
                r"unzip\s+.*-d\s*\.\./".to_string(),
                r"bsdtar\s+.*-s\b".to_string(),
            ],
            check_archive_path_traversal: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedPathsPolicy {
    /// Paths that can never be modified. Globs, gitignore-style.
    pub no_modify: Vec<String>,
    /// Paths whose *content* can never be read. Leading `!` negates.
    pub no_read_content: Vec<String>,
}

impl Default for ProtectedPathsPolicy {
    fn default() -> Self {
        Self {
            no_modify: default_mandatory_deny_globs(),
            no_read_content: vec![
                "**/.env".to_string(),
                "**/.env.*".to_string(),
                "!**/.env.example".to_string(),
                "!**/.env.sample".to_string(),
                "**/.git/**".to_string(),
            ],
        }
    }
}

/// Grounded in the teacher's `MANDATORY_DENY_*` constant groups
/// (sandbox/security/policy.rs), converted from literal filenames into
/// project-wide globs.
fn default_mandatory_deny_globs() -> Vec<String> {
    const SHELL_CONFIGS: &[&str] = &[
        ".bashrc",
        ".bash_profile",
        ".zshrc",
        ".zprofile",
        ".zshenv",
        ".profile",
        ".config/fish/config.fish",
    ];
    const GIT_CONFIGS: &[&str] = &[
        ".gitconfig",
        ".gitmodules",
        ".git/config",
        ".git/hooks/**",
    ];
    const IDE_CONFIGS: &[&str] = &[
        ".vscode/settings.json",
        ".vscode/tasks.json",
        ".vscode/launch.json",
        ".idea/workspace.xml",
    ];
    const PACKAGE_CONFIGS: &[&str] = &[
        ".npmrc",
        ".yarnrc",
        ".pypirc",
        ".cargo/config.toml",
        ".cargo/credentials.toml",
    ];
    const SECURITY_FILES: &[&str] = &[
        ".ssh/**",
        ".gnupg/**",
        ".aws/**",
        ".kube/**",
        ".docker/config.json",
        ".netrc",
    ];
    const AGENT_CONFIGS: &[&str] = &[".mcp.json", ".claude/settings.json"];

    SHELL_CONFIGS
        .iter()
        .chain(GIT_CONFIGS)
        .chain(IDE_CONFIGS)
        .chain(PACKAGE_CONFIGS)
        .chain(SECURITY_FILES)
        .chain(AGENT_CONFIGS)
        .map(|s| format!("**/{s}"))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveFilesPolicy {
    pub forbidden_read: Vec<String>,
    pub code_patterns: Vec<NamedPattern>,
    pub secret_env_vars: Vec<String>,
    pub custom_patterns: Vec<NamedPattern>,
}

impl Default for SensitiveFilesPolicy {
    fn default() -> Self {
        Self {
            forbidden_read: vec![
                "**/.ssh/**".to_string(),
                "**/.aws/credentials".to_string(),
                "**/.netrc".to_string(),
                "**/id_rsa".to_string(),
                "**/id_ed25519".to_string(),
            ],
            code_patterns: Vec::new(),
            secret_env_vars: vec![
                "AWS_SECRET_ACCESS_KEY".to_string(),
                "OPENAI_API_KEY".to_string(),
                "ANTHROPIC_API_KEY".to_string(),
                "GITHUB_TOKEN".to_string(),
            ],
            custom_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DangerousOperationsPolicy {
    pub network: Vec<String>,
    pub sensitive_access: Vec<String>,
    pub secret_scanning: Vec<String>,
    pub system_recon: Vec<String>,
    pub dynamic_execution: Vec<String>,
    pub shell_execution: Vec<String>,
}

impl Default for DangerousOperationsPolicy {
    fn default() -> Self {
        Self {
            network: vec![
                r"(?i)requests\.(get|post|put|delete)\(".to_string(),
                r"(?i)urllib\.request\.".to_string(),
                r"(?i)fetch\(".to_string(),
                r"(?i)axios\.".to_string(),
                r"(?i)https?://".to_string(),
                r"(?i)socket\.socket\(".to_string(),
            ],
            sensitive_access: vec![
                r"(?i)\.ssh".to_string(),
                r"(?i)\.aws[/\\]credentials".to_string(),
                r"(?i)/etc/passwd".to_string(),
                r"(?i)\.netrc".to_string(),
            ],
            secret_scanning: vec![
                r"(?i)aws_secret_access_key".to_string(),
                r"(?i)api[_-]?key\s*=\s*['\"][A-Za-z0-9]{16,}".to_string(),
                r"(?i)-----BEGIN (RSA|OPENSSH|EC) PRIVATE KEY-----".to_string(),
            ],
            system_recon: vec![
                r"(?i)os\.environ".to_string(),
                r"(?i)platform\.".to_string(),
                r"(?i)socket\.gethostname\(".to_string(),
                r"(?i)getpass\.getuser\(".to_string(),
            ],
            dynamic_execution: vec![
                r"\beval\s*\(".to_string(),
                r"\bexec\s*\(".to_string(),
                r"(?i)new\s+Function\(".to_string(),
                r"(?i)compile\s*\(.*,\s*['\"]exec['\"]\)".to_string(),
                r"(?i)pickle\.loads?\(".to_string(),
                r"(?i)marshal\.loads?\(".to_string(),
            ],
            shell_execution: vec![
                r"(?i)subprocess\.(run|call|Popen|check_output)\(".to_string(),
                r"(?i)os\.system\(".to_string(),
                r"(?i)child_process\.(exec|spawn)\(".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPolicy {
    pub enabled: bool,
    pub log_all_calls: bool,
    pub log_blocked_only: bool,
    pub path: Option<String>,
    pub max_value_len: usize,
}

impl Default for LoggingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            log_all_calls: false,
            log_blocked_only: true,
            path: None,
            max_value_len: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Policy {
    pub directories: DirectoriesPolicy,
    pub git: GitPolicy,
    pub bypass_prevention: BypassPolicy,
    pub download_protection: DownloadPolicy,
    pub unpack_protection: UnpackPolicy,
    pub protected_paths: ProtectedPathsPolicy,
    pub sensitive_files: SensitiveFilesPolicy,
    pub dangerous_operations: DangerousOperationsPolicy,
    pub logging: LoggingPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_has_hard_blocked_git_force_push() {
        let policy = Policy::default();
        assert!(policy.git.hard_blocked.iter().any(|p| p.contains("push --force")));
        assert!(policy.git.allowed.iter().any(|p| p.contains("force-with-lease")));
    }

    #[test]
    fn default_policy_deserializes_from_empty_yaml() {
        let policy: Policy = serde_yaml::from_str("{}").expect("empty yaml is valid");
        assert!(!policy.logging.enabled);
    }

    #[test]
    fn protected_paths_include_ssh_and_git_hooks() {
        let policy = Policy::default();
        assert!(policy.protected_paths.no_modify.iter().any(|p| p.contains(".ssh")));
        assert!(policy.protected_paths.no_modify.iter().any(|p| p.contains(".git/hooks")));
    }
}
