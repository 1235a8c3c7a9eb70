//! Worker managers
//!
//! A manager owns a pool of workers and the four queues they feed on:
//! input and result, one pair per priority class. Managers are created
//! once at supervisor startup and never recreated; stopping one is part
//! of shutting the supervisor down.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use overseer_config::ManagerConfig;
use overseer_protocol::{Envelope, Priority};

use crate::error::SupervisorError;
use crate::monitoring::MonitoringEmitter;
use crate::queue::ItemQueue;
use crate::worker::{build_worker, Worker};

/// Nap taken by an idle worker when both input queues are empty
const IDLE_NAP: Duration = Duration::from_millis(10);

/// Nap taken by a worker while processing is gated off
const GATED_NAP: Duration = Duration::from_millis(100);

/// Grace given to in-flight items on a fast stop before aborting
const FAST_STOP_GRACE: Duration = Duration::from_millis(200);

/// Status snapshot published in heartbeats and drain polling
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub globalname: String,
    pub queue_lp_size: usize,
    pub queue_hp_size: usize,
    pub queue_lp_result_size: usize,
    pub queue_hp_result_size: usize,
    pub processdata: bool,
    pub stopdata: bool,
    pub worker_count: usize,
}

/// A group of workers with their queues and result endpoints
pub struct WorkerManager {
    index: usize,
    fullname: String,
    globalname: String,
    cfg: ManagerConfig,

    input_lp: Arc<ItemQueue>,
    input_hp: Arc<ItemQueue>,
    result_lp: Arc<ItemQueue>,
    result_hp: Arc<ItemQueue>,

    // Mirrored from the supervisor by the command handler
    stopdata: AtomicBool,
    processdata: AtomicBool,

    pool_cancel: CancellationToken,
    workers: Mutex<Vec<Arc<dyn Worker>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    worker_count: AtomicUsize,

    emitter: Arc<MonitoringEmitter>,
}

impl WorkerManager {
    /// Create a manager under the given supervisor
    ///
    /// `cancel` is the supervisor's run token; the worker pool gets a
    /// child token so the pool can be stopped on its own.
    pub fn new(
        index: usize,
        supervisor_name: &str,
        cfg: ManagerConfig,
        cancel: &CancellationToken,
        emitter: Arc<MonitoringEmitter>,
    ) -> Arc<Self> {
        let fullname = format!("{}-{}", supervisor_name, cfg.name);
        let globalname = format!("WorkerManager-{fullname}");

        tracing::info!(
            manager = %globalname,
            result_socket_type = ?cfg.result_socket_type,
            result_lp = %cfg.result_lp_socket,
            result_hp = %cfg.result_hp_socket,
            result_dataflow_type = ?cfg.result_dataflow_type,
            "manager created"
        );

        Arc::new(Self {
            index,
            fullname,
            globalname,
            cfg,
            input_lp: Arc::new(ItemQueue::new()),
            input_hp: Arc::new(ItemQueue::new()),
            result_lp: Arc::new(ItemQueue::new()),
            result_hp: Arc::new(ItemQueue::new()),
            stopdata: AtomicBool::new(true),
            processdata: AtomicBool::new(false),
            pool_cancel: cancel.child_token(),
            workers: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            worker_count: AtomicUsize::new(0),
            emitter,
        })
    }

    /// Manager position within the supervisor
    pub fn index(&self) -> usize {
        self.index
    }

    /// `<supervisor>-<manager>` name used as monitoring pidsource
    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    /// `WorkerManager-<fullname>`
    pub fn globalname(&self) -> &str {
        &self.globalname
    }

    /// The manager's configuration entry
    pub fn config(&self) -> &ManagerConfig {
        &self.cfg
    }

    /// Input queue of one priority class
    pub fn input_queue(&self, priority: Priority) -> &Arc<ItemQueue> {
        match priority {
            Priority::Low => &self.input_lp,
            Priority::High => &self.input_hp,
        }
    }

    /// Result queue of one priority class
    pub fn result_queue(&self, priority: Priority) -> &Arc<ItemQueue> {
        match priority {
            Priority::Low => &self.result_lp,
            Priority::High => &self.result_hp,
        }
    }

    /// Gate or ungate the worker pool
    pub fn set_processdata(&self, on: bool) {
        self.processdata.store(on, Ordering::Relaxed);
    }

    /// Whether workers are popping
    pub fn processdata(&self) -> bool {
        self.processdata.load(Ordering::Relaxed)
    }

    /// Mirror the supervisor's ingress gate
    pub fn set_stopdata(&self, on: bool) {
        self.stopdata.store(on, Ordering::Relaxed);
    }

    /// Whether ingress to this manager is gated
    pub fn stopdata(&self) -> bool {
        self.stopdata.load(Ordering::Relaxed)
    }

    /// Size of the started worker pool
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Relaxed)
    }

    /// Whether both input queues are drained
    pub fn input_queues_empty(&self) -> bool {
        self.input_lp.is_empty() && self.input_hp.is_empty()
    }

    /// Whether both result queues are drained
    pub fn result_queues_empty(&self) -> bool {
        self.result_lp.is_empty() && self.result_hp.is_empty()
    }

    /// Launch the worker pool from the configured variant
    pub fn start_workers(self: &Arc<Self>, n: usize) -> Result<(), SupervisorError> {
        let mut pool = Vec::with_capacity(n);
        for _ in 0..n {
            let worker = build_worker(&self.cfg.worker_variant).ok_or_else(|| {
                SupervisorError::UnknownWorkerVariant {
                    variant: self.cfg.worker_variant.clone(),
                    manager: self.globalname.clone(),
                }
            })?;
            pool.push(worker);
        }

        self.start_worker_pool(pool);
        Ok(())
    }

    /// Launch the worker pool from externally supplied instances
    pub fn start_worker_pool(self: &Arc<Self>, pool: Vec<Arc<dyn Worker>>) {
        let mut workers = self.workers.lock();
        let mut tasks = self.tasks.lock();

        for (worker_id, worker) in pool.into_iter().enumerate() {
            workers.push(Arc::clone(&worker));

            let manager = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                worker_loop(worker_id, worker, manager).await;
            }));
        }

        self.worker_count.store(workers.len(), Ordering::Relaxed);
        tracing::info!(manager = %self.globalname, workers = workers.len(), "worker pool started");
    }

    /// Forward a configuration envelope to every worker
    pub fn configure(&self, envelope: &Envelope) {
        if let Ok(value) = serde_json::to_value(envelope) {
            for worker in self.workers.lock().iter() {
                worker.configure(&value);
            }
            tracing::info!(manager = %self.globalname, "workers reconfigured");
        }
    }

    /// Discard everything queued, atomically per queue
    pub fn clean_queue(&self) {
        let discarded = self.input_lp.clear()
            + self.input_hp.clear()
            + self.result_lp.clear()
            + self.result_hp.clear();
        tracing::info!(manager = %self.globalname, discarded, "queues cleaned");
    }

    /// Current status snapshot
    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            globalname: self.globalname.clone(),
            queue_lp_size: self.input_lp.len(),
            queue_hp_size: self.input_hp.len(),
            queue_lp_result_size: self.result_lp.len(),
            queue_hp_result_size: self.result_hp.len(),
            processdata: self.processdata(),
            stopdata: self.stopdata(),
            worker_count: self.worker_count(),
        }
    }

    /// Publish a heartbeat snapshot addressed to `target`
    pub async fn heartbeat(&self, target: &str) {
        match serde_json::to_value(self.snapshot()) {
            Ok(body) => {
                self.emitter
                    .send_heartbeat(body, &self.fullname, target)
                    .await;
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialise heartbeat"),
        }
    }

    /// Stop the worker pool
    ///
    /// With `fast=false` every task finishes the item it has in hand.
    /// With `fast=true` tasks get a short grace and are then aborted.
    pub async fn stop(&self, fast: bool) {
        self.pool_cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for mut task in tasks {
            if fast {
                if tokio::time::timeout(FAST_STOP_GRACE, &mut task)
                    .await
                    .is_err()
                {
                    task.abort();
                }
            } else if let Err(e) = (&mut task).await {
                if !e.is_cancelled() {
                    tracing::warn!(manager = %self.globalname, error = %e, "worker task panicked");
                }
            }
        }

        tracing::info!(manager = %self.globalname, "worker pool stopped");
    }
}

/// One worker task
///
/// HP strictly preempts LP at each pop decision; within a class the
/// queue keeps FIFO order. While `processdata` is off the task naps
/// without touching the queues, so input sizes are non-decreasing.
async fn worker_loop(worker_id: usize, worker: Arc<dyn Worker>, manager: Arc<WorkerManager>) {
    let cancel = manager.pool_cancel.clone();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if !manager.processdata() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(GATED_NAP) => continue,
            }
        }

        let popped = manager
            .input_hp
            .try_pop()
            .map(|item| (item, Priority::High))
            .or_else(|| manager.input_lp.try_pop().map(|item| (item, Priority::Low)));

        let Some((item, priority)) = popped else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_NAP) => continue,
            }
        };

        match worker.process(item, priority).await {
            Ok(result) => manager.result_queue(priority).push(result),
            Err(e) => {
                tracing::warn!(
                    manager = %manager.globalname,
                    worker_id,
                    priority = %priority,
                    error = %e,
                    "worker processing failed, item dropped"
                );
                manager
                    .emitter
                    .send_alarm(1, &e.to_string(), &manager.fullname, 1, priority)
                    .await;
            }
        }
    }

    tracing::debug!(manager = %manager.globalname, worker_id, "worker stopped");
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
