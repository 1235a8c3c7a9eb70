//! Ingress listeners
//!
//! One listener task per priority class pulls frames off the transport
//! and fans each resulting item into every manager's input queue of
//! that class. Which of the three forms a frame takes (`binary`,
//! `string`, `filename`) is fixed per supervisor at startup.
//!
//! While `stopdata` is set the loop is parked: it does not attempt a
//! receive, so upstream backpressure happens at the transport layer
//! rather than in the queues.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use overseer_config::DataflowKind;
use overseer_protocol::{Item, Priority};
use overseer_transport::{PullSocket, SubSocket};

use crate::manager::WorkerManager;
use crate::monitoring::MonitoringEmitter;
use crate::state::SharedState;

/// How often a parked listener rechecks the `stopdata` gate
const GATE_POLL: Duration = Duration::from_millis(100);

/// Either receiving side of the ingress wiring
pub enum IngressSocket {
    /// pushpull: the pulling side, bound
    Pull(PullSocket),
    /// pubsub: the subscribing side, connected
    Sub(SubSocket),
}

impl IngressSocket {
    async fn recv(&mut self) -> Option<Bytes> {
        match self {
            IngressSocket::Pull(socket) => socket.recv().await,
            IngressSocket::Sub(socket) => socket.recv().await,
        }
    }
}

/// A form-specific receive loop for one priority class
pub struct IngressListener {
    priority: Priority,
    dataflow: DataflowKind,
    socket: IngressSocket,
    managers: Vec<Arc<WorkerManager>>,
    shared: Arc<SharedState>,
    emitter: Arc<MonitoringEmitter>,
    pidsource: String,
}

impl IngressListener {
    pub fn new(
        priority: Priority,
        dataflow: DataflowKind,
        socket: IngressSocket,
        managers: Vec<Arc<WorkerManager>>,
        shared: Arc<SharedState>,
        emitter: Arc<MonitoringEmitter>,
        pidsource: String,
    ) -> Self {
        Self {
            priority,
            dataflow,
            socket,
            managers,
            shared,
            emitter,
            pidsource,
        }
    }

    /// Run until `continueall` goes false
    pub async fn run(mut self) {
        let cancel = self.shared.cancel_token();

        tracing::info!(
            priority = %self.priority,
            dataflow = ?self.dataflow,
            "ingress listener started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if self.shared.stopdata() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(GATE_POLL) => continue,
                }
            }

            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = self.socket.recv() => frame,
            };

            match frame {
                Some(bytes) => self.ingest(&bytes).await,
                None => {
                    tracing::warn!(priority = %self.priority, "ingress socket closed");
                    break;
                }
            }
        }

        tracing::info!(priority = %self.priority, "ingress listener stopped");
    }

    async fn ingest(&self, frame: &[u8]) {
        match self.dataflow {
            DataflowKind::String => {
                let text = String::from_utf8_lossy(frame).into_owned();
                self.fan_out(Item::text(text));
            }
            DataflowKind::Binary => match Item::parse_record(frame) {
                Ok(item) => self.fan_out(item),
                Err(e) => {
                    tracing::warn!(priority = %self.priority, error = %e, "undecodable frame dropped");
                }
            },
            DataflowKind::Filename => {
                let path = String::from_utf8_lossy(frame).into_owned();
                self.ingest_file(&path).await;
            }
        }
    }

    /// Push one item into every manager's queue of this class
    fn fan_out(&self, item: Item) {
        for manager in &self.managers {
            manager.input_queue(self.priority).push(item.clone());
        }
    }

    /// Fan a line-delimited record file out, one item per line
    ///
    /// Any open or parse failure abandons the whole file: nothing from
    /// it reaches the queues and there is no retry.
    async fn ingest_file(&self, path: &str) {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!(path, error = %e, "unable to open file");
                self.emitter
                    .send_log(
                        2,
                        &format!("unable to open file {path}: {e}"),
                        &self.pidsource,
                        1,
                        self.priority,
                    )
                    .await;
                return;
            }
        };

        let mut items = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            match Item::parse_record(line.as_bytes()) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::error!(path, error = %e, "error while reading file, abandoning");
                    self.emitter
                        .send_log(
                            2,
                            &format!("error while reading file {path}: {e}"),
                            &self.pidsource,
                            2,
                            self.priority,
                        )
                        .await;
                    return;
                }
            }
        }

        tracing::debug!(path, records = items.len(), priority = %self.priority, "file ingested");
        for item in items {
            self.fan_out(item);
        }
    }
}

#[cfg(test)]
#[path = "ingress_test.rs"]
mod ingress_test;
