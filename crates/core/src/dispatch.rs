//! Result dispatching
//!
//! A single loop drains every manager's result queues to that manager's
//! result sockets, high priority first. Draining uses explicit
//! `try_pop` so the HP-then-LP branch is visible; the loop never blocks
//! on a queue, so workers are never throttled by a slow egress peer.
//!
//! A result endpoint of `"none"` still drains its queue; the items are
//! discarded silently so results can never accumulate behind a
//! disabled output.

use std::sync::Arc;
use std::time::Duration;

use overseer_config::{DataflowKind, ManagerConfig, ResultSocketKind};
use overseer_protocol::{Item, Priority};
use overseer_transport::{Endpoint, PubSocket, PushSocket, TransportError};

use crate::error::SupervisorError;
use crate::manager::WorkerManager;
use crate::state::SharedState;

/// Nap taken when every result queue is empty
const IDLE_NAP: Duration = Duration::from_millis(10);

/// Sending side of one result class
enum ResultSender {
    Push(PushSocket),
    Pub(PubSocket),
}

impl ResultSender {
    async fn open(kind: ResultSocketKind, uri: &str) -> Result<Self, TransportError> {
        let endpoint = Endpoint::parse(uri)?;
        match kind {
            ResultSocketKind::Pushpull => Ok(ResultSender::Push(PushSocket::connect(endpoint))),
            ResultSocketKind::Pubsub => Ok(ResultSender::Pub(PubSocket::bind(&endpoint).await?)),
        }
    }

    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            ResultSender::Push(socket) => socket.send(payload).await,
            ResultSender::Pub(socket) => socket.send(payload).await,
        }
    }
}

/// A manager's pair of result outputs
pub struct ResultChannel {
    dataflow: DataflowKind,
    lp: Option<ResultSender>,
    hp: Option<ResultSender>,
}

impl ResultChannel {
    /// Open the configured result sockets for one manager
    ///
    /// Endpoints set to `"none"` stay unopened; that class's results
    /// will be discarded at dispatch time.
    pub async fn open(cfg: &ManagerConfig) -> Result<Self, SupervisorError> {
        let lp = match cfg.result_lp_endpoint() {
            Some(uri) => Some(ResultSender::open(cfg.result_socket_type, uri).await?),
            None => None,
        };
        let hp = match cfg.result_hp_endpoint() {
            Some(uri) => Some(ResultSender::open(cfg.result_socket_type, uri).await?),
            None => None,
        };

        Ok(Self {
            dataflow: cfg.result_dataflow_type,
            lp,
            hp,
        })
    }

    fn sender(&self, priority: Priority) -> Option<&ResultSender> {
        match priority {
            Priority::Low => self.lp.as_ref(),
            Priority::High => self.hp.as_ref(),
        }
    }
}

/// The single egress loop over all managers
pub struct ResultDispatcher {
    channels: Vec<(Arc<WorkerManager>, ResultChannel)>,
    shared: Arc<SharedState>,
}

impl ResultDispatcher {
    pub fn new(channels: Vec<(Arc<WorkerManager>, ResultChannel)>, shared: Arc<SharedState>) -> Self {
        Self { channels, shared }
    }

    /// Run until `continueall` goes false
    pub async fn run(self) {
        let cancel = self.shared.cancel_token();

        tracing::info!(managers = self.channels.len(), "result dispatcher started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let mut drained = false;
            for (manager, channel) in &self.channels {
                // One item per manager per pass, HP first.
                let popped = manager
                    .result_queue(Priority::High)
                    .try_pop()
                    .map(|item| (item, Priority::High))
                    .or_else(|| {
                        manager
                            .result_queue(Priority::Low)
                            .try_pop()
                            .map(|item| (item, Priority::Low))
                    });

                if let Some((item, priority)) = popped {
                    drained = true;
                    dispatch_one(manager, channel, item, priority).await;
                }
            }

            if !drained {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_NAP) => {}
                }
            }
        }

        tracing::info!("result dispatcher stopped");
    }
}

async fn dispatch_one(
    manager: &WorkerManager,
    channel: &ResultChannel,
    item: Item,
    priority: Priority,
) {
    // "none" endpoint: the class has no output sink; discard.
    let Some(sender) = channel.sender(priority) else {
        return;
    };

    let payload = match channel.dataflow {
        DataflowKind::String | DataflowKind::Filename => item.string_form().into_bytes(),
        DataflowKind::Binary => item.binary_form(),
    };

    if let Err(e) = sender.send(&payload).await {
        tracing::error!(
            manager = %manager.globalname(),
            priority = %priority,
            error = %e,
            "result send failed, dropping item"
        );
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;
