//! Protocol error types

use thiserror::Error;

/// Errors from envelope and item handling
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame bytes are not a valid envelope
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// Frame bytes are not a valid record
    #[error("malformed record: {0}")]
    MalformedRecord(#[source] serde_json::Error),

    /// Envelope could not be serialised
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}
