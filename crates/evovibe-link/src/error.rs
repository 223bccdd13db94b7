//! Error types for evovibe-link

use thiserror::Error;

/// Errors raised while talking to a device worker.
///
/// Every variant is fatal to the in-flight trial: a physical action may
/// already be under way, so callers surface these and never resend.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Could not reach the worker endpoint
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket level failure
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Outgoing message could not be encoded
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// Incoming frame is not a valid message
    #[error("malformed frame {frame:?}: {source}")]
    Malformed {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    /// Peer closed the stream while a reply was expected
    #[error("channel to {endpoint} closed before a reply arrived")]
    Closed { endpoint: String },

    /// send/recv called out of strict alternation
    #[error("out of sequence: {0}")]
    OutOfSequence(&'static str),

    /// Worker refused the command
    #[error("worker rejected {command}: {reason}")]
    Rejected { command: String, reason: String },

    /// Reply kind does not match the command that was sent
    #[error("unexpected reply to {command}: {got}")]
    UnexpectedReply { command: String, got: String },
}

/// Result type for link operations
pub type LinkResult<T> = std::result::Result<T, LinkError>;
