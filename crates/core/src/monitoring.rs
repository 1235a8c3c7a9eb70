//! Monitoring emission
//!
//! One push socket carries every info, alarm, log and heartbeat the
//! supervisor produces. The emitter wraps that socket so any task can
//! emit; sends are best effort and a failure never propagates past a
//! warning in the local log.

use serde_json::Value;

use overseer_protocol::{Envelope, Priority};
use overseer_transport::PushSocket;

/// Shared handle for publishing on the monitoring socket
pub struct MonitoringEmitter {
    socket: PushSocket,
}

impl MonitoringEmitter {
    pub fn new(socket: PushSocket) -> Self {
        Self { socket }
    }

    /// Publish an info report (`type=5`)
    pub async fn send_info(
        &self,
        level: i32,
        message: &str,
        pidsource: &str,
        code: i32,
        priority: Priority,
    ) {
        self.emit(Envelope::info(level, message, pidsource, code, priority))
            .await;
    }

    /// Publish an alarm report (`type=2`)
    pub async fn send_alarm(
        &self,
        level: i32,
        message: &str,
        pidsource: &str,
        code: i32,
        priority: Priority,
    ) {
        self.emit(Envelope::alarm(level, message, pidsource, code, priority))
            .await;
    }

    /// Publish a log report (`type=4`)
    pub async fn send_log(
        &self,
        level: i32,
        message: &str,
        pidsource: &str,
        code: i32,
        priority: Priority,
    ) {
        self.emit(Envelope::log(level, message, pidsource, code, priority))
            .await;
    }

    /// Publish a heartbeat snapshot addressed to `pidtarget`
    pub async fn send_heartbeat(&self, body: Value, pidsource: &str, pidtarget: &str) {
        self.emit(Envelope::heartbeat(body, pidsource, pidtarget))
            .await;
    }

    async fn emit(&self, envelope: Envelope) {
        let bytes = match envelope.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode monitoring message");
                return;
            }
        };

        if let Err(e) = self.socket.send(&bytes).await {
            tracing::warn!(
                error = %e,
                subtype = %envelope.header.subtype,
                "monitoring send failed, dropping message"
            );
        }
    }
}
