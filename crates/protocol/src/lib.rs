//! Wire format for the supervisor's control and monitoring planes.
//!
//! Every message on the wire is one frame whose bytes are a JSON
//! envelope: a `header` describing the message and an optional `body`
//! whose shape depends on the header's `type`. The same envelope layout
//! carries commands, configuration pushes, monitoring reports and
//! heartbeats, so peers can route on the header without knowing every
//! body schema.
//!
//! Data items ([`Item`]) and their two priority classes ([`Priority`])
//! also live here: they are the payloads the supervisor ingests and the
//! results it publishes.

mod command;
mod envelope;
mod error;
mod item;

pub use command::CommandKind;
pub use envelope::{
    Envelope, Header, MSG_ALARM, MSG_COMMAND, MSG_CONFIG, MSG_HEARTBEAT, MSG_INFO, MSG_LOG,
};
pub use error::ProtocolError;
pub use item::{Item, Priority};
