//! Policy discovery and loading.
//!
//! Grounded in the teacher's `RulesConfig::load_from_file`/`load_or_default`
//! priority-list pattern (sandbox/security/rules.rs): a fixed list of
//! candidate filenames is tried in order, the first one found wins, and any
//! failure to read or parse falls back to defaults rather than erroring out.

use std::path::{Path, PathBuf};

use crate::policy::Policy;

/// Filenames tried, in order, when no explicit policy path is given.
pub const POLICY_FILE_NAMES: &[&str] = &[
    ".guardian-policy.yaml",
    ".guardian-policy.yml",
    "guardian.policy.yaml",
];

/// Env var that overrides policy discovery entirely.
pub const POLICY_PATH_ENV: &str = "GUARDIAN_POLICY_FILE";

/// Env var carrying a host-supplied project-root hint.
pub const PROJECT_ROOT_ENV: &str = "GUARDIAN_PROJECT_ROOT";

/// Resolve which policy file to read, if any: explicit CLI flag first, then
/// the env var override, then the priority list resolved against `project_root`.
pub fn discover_policy_path(explicit: Option<&Path>, project_root: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(POLICY_PATH_ENV) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }
    POLICY_FILE_NAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|candidate| candidate.is_file())
}

/// Load the policy, falling back to `Policy::default()` on any error. Never
/// fatal — a missing or malformed policy file must not block the host.
pub fn load_policy(explicit: Option<&Path>, project_root: &Path) -> Policy {
    let Some(path) = discover_policy_path(explicit, project_root) else {
        return Policy::default();
    };

    match std::fs::read_to_string(&path) {
        Ok(raw) => {
            let expanded = expand_env_vars(&raw);
            match serde_yaml::from_str::<Policy>(&expanded) {
                Ok(policy) => policy,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse policy file, using defaults");
                    Policy::default()
                }
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read policy file, using defaults");
            Policy::default()
        }
    }
}

/// Expand `${VAR}` and `$VAR` references against the process environment.
/// Unknown variables are left untouched rather than erroring, matching the
/// degrade-to-defaults posture of the rest of policy loading.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    name.push(inner);
                }
                match std::env::var(&name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(&name);
                        out.push('}');
                    }
                }
            }
            Some(c2) if c2.is_ascii_alphabetic() || *c2 == '_' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match std::env::var(&name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push('$');
                        out.push_str(&name);
                    }
                }
            }
            _ => out.push('$'),
        }
    }

    out
}

/// CI markers the Git check consults for its `ci_auto_allow` branch.
pub const CI_ENV_MARKERS: &[&str] = &["CI", "GITHUB_ACTIONS", "GITLAB_CI", "JENKINS_URL", "CIRCLECI", "TRAVIS"];

/// Whether the process is running under a recognised CI environment.
pub fn is_ci_environment() -> bool {
    CI_ENV_MARKERS.iter().any(|var| std::env::var(var).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn expand_env_vars_substitutes_braced_and_bare() {
        std::env::set_var("GUARDIAN_TEST_VAR", "value");
        assert_eq!(expand_env_vars("${GUARDIAN_TEST_VAR}"), "value");
        assert_eq!(expand_env_vars("$GUARDIAN_TEST_VAR/x"), "value/x");
        assert_eq!(expand_env_vars("${GUARDIAN_TEST_UNSET_VAR}"), "${GUARDIAN_TEST_UNSET_VAR}");
        std::env::remove_var("GUARDIAN_TEST_VAR");
    }

    #[test]
    fn discover_policy_path_prefers_explicit_over_priority_list() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("custom.yaml");
        std::fs::write(&explicit, "{}").unwrap();
        let found = discover_policy_path(Some(&explicit), dir.path());
        assert_eq!(found, Some(explicit));
    }

    #[test]
    fn discover_policy_path_falls_back_to_priority_list() {
        let dir = tempdir().unwrap();
        let candidate = dir.path().join(POLICY_FILE_NAMES[0]);
        std::fs::File::create(&candidate).unwrap().write_all(b"{}").unwrap();
        let found = discover_policy_path(None, dir.path());
        assert_eq!(found, Some(candidate));
    }

    #[test]
    fn load_policy_defaults_when_nothing_found() {
        let dir = tempdir().unwrap();
        let policy = load_policy(None, dir.path());
        assert!(!policy.logging.enabled);
    }
}
