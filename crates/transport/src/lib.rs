//! Message-oriented transport endpoints for the supervisor runtime.
//!
//! Every endpoint exchanges discrete frames over TCP. A frame is a
//! 4-byte big-endian length prefix followed by the payload:
//!
//! ```text
//! [4 bytes: length (big-endian)][N bytes: payload]
//! ```
//!
//! Four socket roles cover the wiring a supervisor needs:
//!
//! - [`PullSocket`] binds and fans in frames from any number of pushers.
//! - [`PushSocket`] connects to a single puller and reconnects on failure.
//! - [`SubSocket`] connects to a publisher and receives every frame.
//! - [`PubSocket`] binds and fans every frame out to all subscribers.
//!
//! Receiving sockets hand out frames through an internal channel, so a
//! receive is always interruptible by selecting against a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

mod endpoint;
mod error;
mod frame;
mod pull;
mod push;
mod pubsub;

pub use endpoint::Endpoint;
pub use error::TransportError;
pub use frame::MAX_FRAME_SIZE;
pub use pull::PullSocket;
pub use push::PushSocket;
pub use pubsub::{PubSocket, SubSocket};
