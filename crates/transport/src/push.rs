//! Push socket - connecting send endpoint
//!
//! The pushing side of a pushpull pair. Connects lazily on first send
//! and invalidates the connection on any write failure so the next send
//! reconnects. Callers decide what a failed send means; the socket
//! itself never retries a frame.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::frame::write_frame;

/// Connecting send socket
pub struct PushSocket {
    endpoint: Endpoint,
    connection: Mutex<Option<TcpStream>>,
    connect_timeout: Duration,
}

impl PushSocket {
    /// Create a socket targeting the endpoint
    ///
    /// No connection is attempted until the first send.
    pub fn connect(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connection: Mutex::new(None),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// The endpoint this socket targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one frame, connecting or reconnecting as needed
    ///
    /// On failure the connection is dropped and the error returned; the
    /// frame is not retried.
    pub async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut conn = self.connection.lock().await;

        if conn.is_none() {
            *conn = Some(self.dial().await?);
        }

        let stream = conn.as_mut().ok_or(TransportError::Closed)?;
        match write_frame(stream, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                *conn = None;
                Err(e)
            }
        }
    }

    async fn dial(&self) -> Result<TcpStream, TransportError> {
        let address = self.endpoint.address();
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::Connect { address, source: e });
            }
            Err(_) => {
                return Err(TransportError::Connect {
                    address,
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        tracing::debug!(endpoint = %self.endpoint, "push socket connected");
        Ok(stream)
    }
}

#[cfg(test)]
#[path = "push_test.rs"]
mod push_test;
