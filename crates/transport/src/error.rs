//! Transport error types

use thiserror::Error;

/// Errors from transport endpoints
#[derive(Debug, Error)]
pub enum TransportError {
    /// Endpoint URI could not be parsed
    #[error("invalid endpoint '{uri}': {reason}")]
    InvalidEndpoint { uri: String, reason: &'static str },

    /// Failed to bind to an address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect to a peer
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame exceeds the size cap
    #[error("frame size {size} exceeds limit {limit}")]
    FrameTooLarge { size: u32, limit: u32 },

    /// The socket has been closed
    #[error("socket closed")]
    Closed,
}
