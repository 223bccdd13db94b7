//! Error types for the device worker

use evovibe_link::LinkError;
use thiserror::Error;

/// Failures that end a worker session.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// `Initialise` parameters violate the parameter contract
    #[error("invalid initialise parameters: {0}")]
    InvalidParams(String),

    /// Candidate does not fit the configured chromosome encoding
    #[error("candidate has {got} genes, {kind} expects {expected}")]
    CandidateEncoding {
        kind: String,
        expected: usize,
        got: usize,
    },

    /// Actuator or sensor failure
    #[error("hardware failure: {0}")]
    Hardware(String),

    /// Channel to the master broke
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Result type for worker operations
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
