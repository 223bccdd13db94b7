//! Error types for evovibe-media

use std::path::PathBuf;
use thiserror::Error;

/// Failures of an external media tool.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Tool command line is empty
    #[error("tool {0} has an empty command")]
    EmptyCommand(String),

    /// Tool could not be started
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Tool ran longer than allowed
    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    /// Tool exited unsuccessfully
    #[error("{tool} exited with code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// Tool output could not be interpreted
    #[error("{tool} produced unreadable output {output:?}")]
    Output { tool: String, output: String },

    /// Splitter produced a different number of frames than requested
    #[error("expected {expected} frames, found {found}")]
    FrameCount { expected: usize, found: usize },

    /// Geometry does not fit the image
    #[error("region of interest outside {width}x{height} image: {reason}")]
    Geometry {
        width: u32,
        height: u32,
        reason: String,
    },

    /// Filesystem failure
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for media operations
pub type MediaResult<T> = std::result::Result<T, MediaError>;
