//! Downloaded-file ledger: the only durable, process-wide mutable state the
//! guardian keeps. Read-modify-written by the Download check, consulted by
//! the Execution check, and written atomically (temp file + rename) so a
//! concurrent invocation never observes a partial write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub url: String,
    pub downloaded_at: DateTime<Utc>,
    pub checked_binary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: HashMap<String, LedgerEntry>,
}

impl Ledger {
    /// Load the ledger from `path`; a missing or malformed file is treated
    /// as an empty ledger rather than an error, matching the rest of the
    /// guardian's "degrade, never abort" posture.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn contains(&self, canonical_path: &str) -> bool {
        self.entries.contains_key(canonical_path)
    }

    pub fn record(&mut self, canonical_path: String, url: String) {
        self.entries.insert(
            canonical_path,
            LedgerEntry {
                url,
                downloaded_at: Utc::now(),
                checked_binary: false,
            },
        );
    }

    /// Write atomically: serialise to a temp file in the same directory as
    /// `path`, then rename over the destination.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = tmp_sibling_path(path);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn tmp_sibling_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("ledger");
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Record a download in the ledger at `ledger_path` (relative to
/// `project_root`), creating the ledger if absent. Failures are swallowed —
/// per the error-handling design, ledger I/O never turns into a deny.
pub fn record_download(project_root: &Path, ledger_path: &str, canonical_path: &str, url: &str) {
    let path = project_root.join(ledger_path);
    let mut ledger = Ledger::load(&path);
    ledger.record(canonical_path.to_string(), url.to_string());
    let _ = ledger.save(&path);
}

/// Check whether `canonical_path` is present in the ledger at `ledger_path`.
pub fn is_downloaded(project_root: &Path, ledger_path: &str, canonical_path: &str) -> bool {
    let path = project_root.join(ledger_path);
    Ledger::load(&path).contains(canonical_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_record_and_query() {
        let dir = tempdir().unwrap();
        record_download(dir.path(), "ledger.json", "/project/payload.sh", "https://example.com/payload.sh");
        assert!(is_downloaded(dir.path(), "ledger.json", "/project/payload.sh"));
        assert!(!is_downloaded(dir.path(), "ledger.json", "/project/other.sh"));
    }

    #[test]
    fn save_writes_atomically_via_rename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = Ledger::default();
        ledger.record("a".to_string(), "https://x".to_string());
        ledger.save(&path).unwrap();
        assert!(path.exists());
        assert!(!tmp_sibling_path(&path).exists());

        let reloaded = Ledger::load(&path);
        assert!(reloaded.contains("a"));
    }

    #[test]
    fn missing_ledger_file_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("nope.json"));
        assert!(!ledger.contains("anything"));
    }
}
