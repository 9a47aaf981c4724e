//! Crate-local error type for internal `?`-propagation.
//!
//! Never surfaced to the host as a protocol error: every public entry point
//! on the decision path catches `GuardError` and folds it into an allow
//! decision or a logged default (see the error handling design in
//! SPEC_FULL.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("subprocess error: {0}")]
    Subprocess(String),
}

pub type Result<T> = std::result::Result<T, GuardError>;
