//! The supervisor runtime.
//!
//! A supervisor ingests items from two priority-classed channels,
//! dispatches them to a pool of workers grouped under one or more
//! [`WorkerManager`]s, and publishes the results on two priority-classed
//! output channels. A command subscription drives the state machine;
//! monitoring reports go out on a dedicated push socket.
//!
//! The pieces compose bottom-up:
//!
//! - [`ItemQueue`] — thread-safe FIFO, four per manager
//! - [`Worker`] — the per-item transform contract
//! - [`WorkerManager`] — a worker pool plus its queues
//! - [`IngressListener`] — transport → input queues, gated by `stopdata`
//! - [`ResultDispatcher`] — result queues → result sockets, HP first
//! - [`MonitoringEmitter`] — info / alarm / log / heartbeat emission
//! - [`Supervisor`] — wiring, state machine, signals, command loop

mod dispatch;
mod error;
mod ingress;
mod manager;
mod monitoring;
mod queue;
mod signal;
mod state;
mod supervisor;
mod worker;

pub use dispatch::{ResultChannel, ResultDispatcher};
pub use error::SupervisorError;
pub use ingress::{IngressListener, IngressSocket};
pub use manager::{ManagerSnapshot, WorkerManager};
pub use monitoring::MonitoringEmitter;
pub use queue::ItemQueue;
pub use state::{SharedState, State};
pub use supervisor::{control, ControlEvent, ControlHandle, Supervisor};
pub use worker::{build_worker, EchoWorker, FnWorker, Worker, WorkerError};
