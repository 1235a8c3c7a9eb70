//! Pull socket - binding fan-in endpoint
//!
//! The pulling side of a pushpull pair. Binds a listener, accepts any
//! number of pushing peers and merges their frames into a single
//! receive stream. Each connection runs in its own reader task; a
//! reader exits on peer EOF, on a framing error, or when the socket is
//! dropped.

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::frame::read_frame;

/// Frames buffered between reader tasks and the consumer
const RECV_BUFFER: usize = 1024;

/// Binding fan-in socket
pub struct PullSocket {
    rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
    local_addr: std::net::SocketAddr,
}

impl PullSocket {
    /// Bind to the endpoint and start accepting pushers
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let address = endpoint.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| TransportError::Bind {
                address: address.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(RECV_BUFFER);
        let cancel = CancellationToken::new();
        let accept_cancel = cancel.clone();

        tokio::spawn(async move {
            accept_loop(listener, tx, accept_cancel).await;
        });

        tracing::debug!(address = %local_addr, "pull socket bound");

        Ok(Self {
            rx,
            cancel,
            local_addr,
        })
    }

    /// Receive the next frame from any peer
    ///
    /// Returns `None` once the socket has been closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// The address the listener actually bound to
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

impl Drop for PullSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        tracing::trace!(peer = %peer, "pusher connected");
                        let tx = tx.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            read_connection(stream, tx, cancel).await;
                        });
                    }
                    Err(e) => {
                        // Transient accept errors - log and continue
                        tracing::warn!(error = %e, "pull accept error");
                    }
                }
            }
        }
    }
}

async fn read_connection(mut stream: TcpStream, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = read_frame(&mut stream) => {
                match result {
                    Ok(Some(frame)) => {
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "pull connection error");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pull_test.rs"]
mod pull_test;
