//! The worker contract and built-in variants
//!
//! A worker is a stateless transformer from item to item. Variants are
//! supplied externally and selected per manager through the
//! `worker_variant` configuration tag; embedders can also hand a
//! manager arbitrary implementations directly.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;

use overseer_protocol::{Item, Priority};

/// Worker processing failure
///
/// The item that caused it is dropped, not retried; the failure is
/// reported through the monitoring emitter by the worker pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The item could not be processed
    #[error("processing failed: {0}")]
    Failed(String),
}

/// Per-item transformer
///
/// `process` is a pure function over the item; it may take arbitrary
/// time and may fail. `configure` replaces the worker's configuration
/// with the latest pushed envelope.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Absorb a configuration envelope
    fn configure(&self, configuration: &Value);

    /// Transform one item
    async fn process(&self, item: Item, priority: Priority) -> Result<Item, WorkerError>;
}

/// Default variant: wraps the item payload with the priority class that
/// produced it
pub struct EchoWorker {
    configuration: Mutex<Option<Value>>,
}

impl EchoWorker {
    pub fn new() -> Self {
        Self {
            configuration: Mutex::new(None),
        }
    }

    /// Latest configuration pushed to this worker, if any
    pub fn configuration(&self) -> Option<Value> {
        self.configuration.lock().clone()
    }
}

impl Default for EchoWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for EchoWorker {
    fn configure(&self, configuration: &Value) {
        *self.configuration.lock() = Some(configuration.clone());
    }

    async fn process(&self, item: Item, priority: Priority) -> Result<Item, WorkerError> {
        let data = match item {
            Item::Text(s) => Value::String(s),
            Item::Record(v) => v,
        };
        Ok(Item::record(json!({
            "data": data,
            "priority": priority.as_str(),
        })))
    }
}

/// Adapter turning a closure into a worker, for tests and embedders
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F>
where
    F: Fn(Item, Priority) -> Result<Item, WorkerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Worker for FnWorker<F>
where
    F: Fn(Item, Priority) -> Result<Item, WorkerError> + Send + Sync,
{
    fn configure(&self, _configuration: &Value) {}

    async fn process(&self, item: Item, priority: Priority) -> Result<Item, WorkerError> {
        (self.f)(item, priority)
    }
}

/// Resolve a `worker_variant` configuration tag to an instance
///
/// Returns `None` for tags this build does not provide, which is a
/// startup error.
pub fn build_worker(variant: &str) -> Option<Arc<dyn Worker>> {
    match variant {
        "echo" => Some(Arc::new(EchoWorker::new())),
        _ => None,
    }
}
