//! The JSON envelope shared by commands, configuration and monitoring
//!
//! ```text
//! {
//!   "header": {
//!     "type": 5, "subtype": "info", "time": 1721729312.4,
//!     "pidsource": "RTA1", "pidtarget": "*", "priority": "Low"
//!   },
//!   "body": { "level": 1, "code": 1, "message": "Waiting" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::command::CommandKind;
use crate::error::ProtocolError;
use crate::item::Priority;

/// Header `type` for control commands
pub const MSG_COMMAND: u8 = 0;
/// Header `type` for heartbeat snapshots
pub const MSG_HEARTBEAT: u8 = 1;
/// Header `type` for alarms
pub const MSG_ALARM: u8 = 2;
/// Header `type` for configuration pushes
pub const MSG_CONFIG: u8 = 3;
/// Header `type` for log reports
pub const MSG_LOG: u8 = 4;
/// Header `type` for info reports
pub const MSG_INFO: u8 = 5;

/// Envelope header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Message family; one of the `MSG_*` constants
    #[serde(rename = "type")]
    pub kind: u8,

    /// Family-specific discriminator (command name, "info", "alarm", ...)
    pub subtype: String,

    /// Wall-clock seconds since the epoch
    pub time: f64,

    /// Name of the emitting peer
    pub pidsource: String,

    /// Addressed peer: a supervisor name, `"all"` or `"*"`
    pub pidtarget: String,

    /// Priority tag of the message itself
    pub priority: Priority,
}

/// A complete wire message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Envelope {
    fn report(
        kind: u8,
        subtype: &str,
        level: i32,
        message: &str,
        pidsource: &str,
        code: i32,
        priority: Priority,
    ) -> Self {
        Self {
            header: Header {
                kind,
                subtype: subtype.to_string(),
                time: now_seconds(),
                pidsource: pidsource.to_string(),
                pidtarget: "*".to_string(),
                priority,
            },
            body: json!({ "level": level, "code": code, "message": message }),
        }
    }

    /// Build an info report (`type=5`)
    pub fn info(level: i32, message: &str, pidsource: &str, code: i32, priority: Priority) -> Self {
        Self::report(MSG_INFO, "info", level, message, pidsource, code, priority)
    }

    /// Build an alarm report (`type=2`)
    pub fn alarm(level: i32, message: &str, pidsource: &str, code: i32, priority: Priority) -> Self {
        Self::report(MSG_ALARM, "alarm", level, message, pidsource, code, priority)
    }

    /// Build a log report (`type=4`)
    pub fn log(level: i32, message: &str, pidsource: &str, code: i32, priority: Priority) -> Self {
        Self::report(MSG_LOG, "log", level, message, pidsource, code, priority)
    }

    /// Build a heartbeat snapshot (`type=1`) addressed to `pidtarget`
    pub fn heartbeat(body: Value, pidsource: &str, pidtarget: &str) -> Self {
        Self {
            header: Header {
                kind: MSG_HEARTBEAT,
                subtype: "monitoring".to_string(),
                time: now_seconds(),
                pidsource: pidsource.to_string(),
                pidtarget: pidtarget.to_string(),
                priority: Priority::Low,
            },
            body,
        }
    }

    /// Build a control command (`type=0`)
    pub fn command(kind: &CommandKind, pidsource: &str, pidtarget: &str) -> Self {
        Self {
            header: Header {
                kind: MSG_COMMAND,
                subtype: kind.as_str().to_string(),
                time: now_seconds(),
                pidsource: pidsource.to_string(),
                pidtarget: pidtarget.to_string(),
                priority: Priority::Low,
            },
            body: Value::Null,
        }
    }

    /// Build a configuration push (`type=3`)
    pub fn config(body: Value, pidsource: &str, pidtarget: &str) -> Self {
        Self {
            header: Header {
                kind: MSG_CONFIG,
                subtype: "config".to_string(),
                time: now_seconds(),
                pidsource: pidsource.to_string(),
                pidtarget: pidtarget.to_string(),
                priority: Priority::Low,
            },
            body,
        }
    }

    /// Parse an envelope from frame bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::MalformedEnvelope)
    }

    /// Serialise the envelope to frame bytes
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Whether this envelope is addressed to the named peer
    ///
    /// `"all"` and `"*"` address everyone.
    pub fn targets(&self, name: &str) -> bool {
        let t = self.header.pidtarget.as_str();
        t == name || t == "all" || t == "*"
    }

    /// The command this envelope carries, if it is a command at all
    pub fn command_kind(&self) -> Option<CommandKind> {
        (self.header.kind == MSG_COMMAND).then(|| CommandKind::parse(&self.header.subtype))
    }
}

/// Wall-clock seconds, with sub-second resolution
fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod envelope_test;
