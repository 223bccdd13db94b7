//! Error types for evovibe-state

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the experiment log layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Filesystem failure on a log file
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row could not be decoded
    #[error("{file} line {line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    /// Header row differs from what this version writes
    #[error("{file}: unexpected header {found:?}")]
    Header { file: String, found: String },

    /// Expected log file is absent
    #[error("log file missing: {0}")]
    Missing(PathBuf),

    /// Refusing to overwrite an existing log
    #[error("log file already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Result type for log operations
pub type StateResult<T> = std::result::Result<T, StateError>;
