//! Pub/sub sockets
//!
//! [`PubSocket`] is the binding side: it accepts subscriber connections
//! and fans every frame out to all of them, silently pruning peers that
//! have gone away. [`SubSocket`] is the connecting side: it dials the
//! publisher, retrying until the socket is dropped, and receives every
//! frame. There is no topic filtering; a subscriber sees everything the
//! publisher sends.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::frame::{read_frame, write_frame};

/// Frames buffered between the reader task and the consumer
const RECV_BUFFER: usize = 1024;

/// Delay between subscriber reconnect attempts
const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

/// Binding fan-out socket
pub struct PubSocket {
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
    cancel: CancellationToken,
    local_addr: std::net::SocketAddr,
}

impl PubSocket {
    /// Bind to the endpoint and start accepting subscribers
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let address = endpoint.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| TransportError::Bind {
                address: address.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        let subscribers = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let accept_subs = Arc::clone(&subscribers);
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                tracing::trace!(peer = %peer, "subscriber connected");
                                let _ = stream.set_nodelay(true);
                                accept_subs.lock().await.push(stream);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "pub accept error");
                            }
                        }
                    }
                }
            }
        });

        tracing::debug!(address = %local_addr, "pub socket bound");

        Ok(Self {
            subscribers,
            cancel,
            local_addr,
        })
    }

    /// Send one frame to every connected subscriber
    ///
    /// Peers that fail the write are dropped. Sending with no
    /// subscribers is not an error; the frame simply goes nowhere.
    pub async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut subs = self.subscribers.lock().await;
        let mut alive = Vec::with_capacity(subs.len());

        for mut stream in subs.drain(..) {
            match write_frame(&mut stream, payload).await {
                Ok(()) => alive.push(stream),
                Err(e) => {
                    tracing::trace!(error = %e, "dropping dead subscriber");
                }
            }
        }

        *subs = alive;
        Ok(())
    }

    /// Number of currently connected subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// The address the listener actually bound to
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connecting receive-all socket
pub struct SubSocket {
    rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
}

impl SubSocket {
    /// Connect to a publisher endpoint
    ///
    /// The connection is established in the background and re-dialled
    /// whenever it drops, so the publisher may come up after the
    /// subscriber.
    pub fn connect(endpoint: Endpoint) -> Self {
        let (tx, rx) = mpsc::channel(RECV_BUFFER);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            subscribe_loop(endpoint, tx, task_cancel).await;
        });

        Self { rx, cancel }
    }

    /// Receive the next published frame
    ///
    /// Returns `None` once the socket has been closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn subscribe_loop(endpoint: Endpoint, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
    loop {
        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return,
            result = TcpStream::connect(endpoint.address()) => {
                match result {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::trace!(endpoint = %endpoint, error = %e, "subscriber connect failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(RECONNECT_INTERVAL) => continue,
                        }
                    }
                }
            }
        };

        tracing::debug!(endpoint = %endpoint, "sub socket connected");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = read_frame(&mut stream) => {
                    match result {
                        Ok(Some(frame)) => {
                            if tx.send(frame).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::debug!(error = %e, "sub connection error");
                            break;
                        }
                    }
                }
            }
        }

        // Publisher went away; dial again after a pause.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_INTERVAL) => {}
        }
    }
}

#[cfg(test)]
#[path = "pubsub_test.rs"]
mod pubsub_test;
