use std::path::PathBuf;
use thiserror::Error;

/// Result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the scanner, the diff/patch engine and the zfs layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid caller input: bad date range, unknown compare method,
    /// path outside of any known dataset.
    #[error("{0}")]
    Validation(String),

    /// Dataset, snapshot or file not found.
    #[error("{0}")]
    NotFound(String),

    /// The live file no longer matches the version the deltas were
    /// computed against. Recoverable: re-scan and retry.
    #[error("unexpected content in '{path}' at byte {pos} - file changed since the diff was taken?")]
    VerificationFailed { path: PathBuf, pos: u64 },

    /// Read/write/rename/copy failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The zfs subprocess exited non-zero.
    #[error("zfs command failed: {stderr}")]
    ZfsCommand { stderr: String },

    /// The zfs binary could not be spawned at all.
    #[error("'zfs' executable not found - try again with the 'use-sudo' option")]
    ZfsNotFound,
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
