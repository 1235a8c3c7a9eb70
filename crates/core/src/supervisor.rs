//! The supervisor orchestrator
//!
//! Wires sockets, managers, listeners and the dispatcher together,
//! then runs the command loop until `continueall` goes false. All state
//! transitions happen here, driven by command envelopes, OS signals or
//! an embedder holding a [`ControlHandle`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use overseer_config::{DataSocketKind, SupervisorConfig};
use overseer_protocol::{CommandKind, Envelope, Priority, MSG_COMMAND, MSG_CONFIG};
use overseer_transport::{Endpoint, PullSocket, PushSocket, SubSocket};

use crate::dispatch::{ResultChannel, ResultDispatcher};
use crate::error::SupervisorError;
use crate::ingress::{IngressListener, IngressSocket};
use crate::manager::WorkerManager;
use crate::monitoring::MonitoringEmitter;
use crate::signal;
use crate::state::{SharedState, State};

/// Receive timeout of the command loop; doubles as its idle watchdog
const COMMAND_IDLE: Duration = Duration::from_secs(1);

/// Poll interval while waiting for queues to drain on cleaned shutdown
const DRAIN_POLL: Duration = Duration::from_millis(200);

/// Settle time between gating the pipeline off and stopping the pools
const STOP_SETTLE: Duration = Duration::from_millis(100);

/// How long service tasks get to exit before being aborted
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// An out-of-band instruction for the command loop
#[derive(Debug)]
pub enum ControlEvent {
    /// Apply a command as if it had arrived on the command socket
    Command(CommandKind),
}

/// Cloneable handle for injecting commands into a running supervisor
///
/// The signal tasks use one; embedders that run with `custom` ingress
/// can use another to drive the state machine directly.
#[derive(Clone)]
pub struct ControlHandle {
    tx: UnboundedSender<ControlEvent>,
}

impl ControlHandle {
    /// Inject a command; returns false once the supervisor is gone
    pub fn send(&self, command: CommandKind) -> bool {
        self.tx.send(ControlEvent::Command(command)).is_ok()
    }
}

/// Process-wide handle to the current supervisor's control channel,
/// set at construction and cleared on shutdown
static CONTROL: Mutex<Option<ControlHandle>> = Mutex::new(None);

/// The control handle of the supervisor running in this process, if any
pub fn control() -> Option<ControlHandle> {
    CONTROL.lock().clone()
}

/// A data-processing supervisor node
pub struct Supervisor {
    name: String,
    fullname: String,
    globalname: String,
    pid: u32,
    cfg: SupervisorConfig,
    shared: Arc<SharedState>,
    emitter: Arc<MonitoringEmitter>,
    managers: Vec<Arc<WorkerManager>>,
    command_socket: Option<SubSocket>,
    control_tx: UnboundedSender<ControlEvent>,
    control_rx: Option<UnboundedReceiver<ControlEvent>>,
}

impl Supervisor {
    /// Construct a supervisor from its configuration section
    ///
    /// Creates the command and monitoring sockets and the managers, but
    /// starts nothing; [`run`](Self::run) brings the pipeline up. Must
    /// be called within a tokio runtime.
    pub fn new(cfg: SupervisorConfig, name: &str) -> Result<Self, SupervisorError> {
        let fullname = name.to_string();
        let globalname = format!("Supervisor-{name}");
        let pid = std::process::id();

        tracing::info!(
            supervisor = %globalname,
            dataflow_type = ?cfg.dataflow_type,
            processing_type = %cfg.processing_type,
            datasocket_type = ?cfg.datasocket_type,
            pid,
            "supervisor starting"
        );

        let monitoring = PushSocket::connect(Endpoint::parse(&cfg.monitoring_socket)?);
        let emitter = Arc::new(MonitoringEmitter::new(monitoring));

        let command_socket = SubSocket::connect(Endpoint::parse(&cfg.command_socket)?);

        let shared = Arc::new(SharedState::new());
        let cancel = shared.cancel_token();

        let managers = cfg
            .managers
            .iter()
            .enumerate()
            .map(|(index, mcfg)| {
                WorkerManager::new(index, name, mcfg.clone(), &cancel, Arc::clone(&emitter))
            })
            .collect();

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        *CONTROL.lock() = Some(ControlHandle {
            tx: control_tx.clone(),
        });

        Ok(Self {
            name: name.to_string(),
            fullname,
            globalname,
            pid,
            cfg,
            shared,
            emitter,
            managers,
            command_socket: Some(command_socket),
            control_tx,
            control_rx: Some(control_rx),
        })
    }

    /// Supervisor name from the configuration document
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Supervisor-<name>`
    pub fn globalname(&self) -> &str {
        &self.globalname
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current top-level state
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Shared flags, for observers
    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    /// The managers, in configuration order
    pub fn managers(&self) -> &[Arc<WorkerManager>] {
        &self.managers
    }

    /// A handle for injecting commands into this supervisor
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.control_tx.clone(),
        }
    }

    /// Bring the pipeline up and run to `Shutdown`
    ///
    /// Returns once every loop has exited. An error here is a startup
    /// failure; after the pipeline is up the supervisor only ever
    /// finishes cleanly.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        self.emitter
            .send_info(1, State::Initialised.as_str(), &self.fullname, 1, Priority::Low)
            .await;

        signal::install(self.control_tx.clone());

        let mut service_tasks = Vec::new();
        let startup = self.start_services(&mut service_tasks).await;

        let result = match startup {
            Ok(()) => {
                self.transition(State::Waiting).await;
                tracing::info!(supervisor = %self.globalname, "supervisor running");
                if let (Some(socket), Some(control_rx)) =
                    (self.command_socket.take(), self.control_rx.take())
                {
                    self.command_loop(socket, control_rx).await;
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(supervisor = %self.globalname, error = %e, "startup failed");
                Err(e)
            }
        };

        self.shared.set_state(State::Shutdown);
        self.shared.stop_all_loops();

        for mut task in service_tasks {
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }

        *CONTROL.lock() = None;
        tracing::info!(supervisor = %self.globalname, "supervisor terminated");
        result
    }

    /// Start ingress listeners, the result dispatcher and worker pools
    async fn start_services(
        &self,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), SupervisorError> {
        let classes = [
            (Priority::Low, self.cfg.data_lp_socket.clone()),
            (Priority::High, self.cfg.data_hp_socket.clone()),
        ];

        for (priority, uri) in classes {
            let Some(socket) = open_ingress_socket(self.cfg.datasocket_type, &uri).await? else {
                tracing::info!(supervisor = %self.globalname, "custom data receiver, ingress sockets skipped");
                break;
            };

            let listener = IngressListener::new(
                priority,
                self.cfg.dataflow_type,
                socket,
                self.managers.clone(),
                Arc::clone(&self.shared),
                Arc::clone(&self.emitter),
                self.fullname.clone(),
            );
            tasks.push(tokio::spawn(listener.run()));
        }

        let mut channels = Vec::with_capacity(self.managers.len());
        for manager in &self.managers {
            let channel = ResultChannel::open(manager.config()).await?;
            channels.push((Arc::clone(manager), channel));
        }
        tasks.push(tokio::spawn(
            ResultDispatcher::new(channels, Arc::clone(&self.shared)).run(),
        ));

        for manager in &self.managers {
            manager.start_workers(manager.config().num_workers)?;
        }

        Ok(())
    }

    /// The main command loop, with a 1-second idle watchdog
    async fn command_loop(
        &self,
        mut socket: SubSocket,
        mut control_rx: UnboundedReceiver<ControlEvent>,
    ) {
        let cancel = self.shared.cancel_token();

        while self.shared.continue_all() {
            tokio::select! {
                _ = cancel.cancelled() => break,

                event = control_rx.recv() => {
                    match event {
                        Some(ControlEvent::Command(kind)) => {
                            tracing::info!(command = %kind, "control event");
                            self.apply_command(&kind, &self.fullname).await;
                        }
                        None => break,
                    }
                }

                result = tokio::time::timeout(COMMAND_IDLE, socket.recv()) => {
                    match result {
                        Ok(Some(frame)) => self.handle_frame(&frame).await,
                        Ok(None) => {
                            tracing::warn!("command socket closed");
                            break;
                        }
                        // Idle watchdog tick: nothing arrived this second.
                        Err(_) => {}
                    }
                }
            }
        }
    }

    /// Decode one command-socket frame and dispatch it
    async fn handle_frame(&self, frame: &[u8]) {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable command frame dropped");
                return;
            }
        };

        match envelope.header.kind {
            MSG_COMMAND => {
                if !envelope.targets(&self.name) {
                    tracing::trace!(pidtarget = %envelope.header.pidtarget, "command for another supervisor");
                    return;
                }
                let Some(kind) = envelope.command_kind() else {
                    return;
                };
                tracing::info!(
                    command = %kind,
                    pidsource = %envelope.header.pidsource,
                    "command received"
                );
                self.apply_command(&kind, &envelope.header.pidsource).await;
            }
            MSG_CONFIG => {
                for manager in &self.managers {
                    manager.configure(&envelope);
                }
            }
            other => {
                // Unknown message families are ignored silently.
                tracing::trace!(kind = other, "ignoring message type");
            }
        }
    }

    async fn apply_command(&self, kind: &CommandKind, pidsource: &str) {
        match kind {
            CommandKind::Shutdown => self.command_shutdown().await,
            CommandKind::CleanedShutdown => self.command_cleanedshutdown().await,
            CommandKind::GetStatus => {
                for manager in &self.managers {
                    manager.heartbeat(pidsource).await;
                }
            }
            CommandKind::Start => self.command_start().await,
            CommandKind::Stop => self.command_stop().await,
            CommandKind::StartProcessing => self.command_startprocessing().await,
            CommandKind::StopProcessing => self.command_stopprocessing().await,
            CommandKind::StartData => self.command_startdata(),
            CommandKind::StopData => self.command_stopdata(),
            CommandKind::Reset => self.command_reset().await,
            CommandKind::Unknown(subtype) => {
                tracing::debug!(subtype = %subtype, "unknown command ignored");
            }
        }
    }

    /// Enter a state and report it on the monitoring channel
    async fn transition(&self, state: State) {
        self.shared.set_state(state);
        self.emitter
            .send_info(1, state.as_str(), &self.fullname, 1, Priority::Low)
            .await;
    }

    async fn command_start(&self) {
        self.command_startprocessing().await;
        self.command_startdata();
    }

    async fn command_stop(&self) {
        self.command_stopdata();
        self.command_stopprocessing().await;
    }

    async fn command_startprocessing(&self) {
        self.transition(State::Processing).await;
        for manager in &self.managers {
            manager.set_processdata(true);
        }
    }

    async fn command_stopprocessing(&self) {
        self.transition(State::Waiting).await;
        for manager in &self.managers {
            manager.set_processdata(false);
        }
    }

    fn command_startdata(&self) {
        self.shared.set_stopdata(false);
        for manager in &self.managers {
            manager.set_stopdata(false);
        }
    }

    fn command_stopdata(&self) {
        self.shared.set_stopdata(true);
        for manager in &self.managers {
            manager.set_stopdata(true);
        }
    }

    async fn command_reset(&self) {
        let state = self.shared.state();
        if !matches!(state, State::Processing | State::Waiting) {
            tracing::warn!(state = %state, "reset ignored outside Processing/Waiting");
            return;
        }

        self.command_stop().await;
        for manager in &self.managers {
            tracing::info!(manager = %manager.globalname(), "resetting");
            manager.clean_queue();
        }
        self.transition(State::Waiting).await;
    }

    async fn command_shutdown(&self) {
        self.shared.set_state(State::Shutdown);
        self.stop_all(false).await;
    }

    /// Stop ingress, drain every queue, then shut down
    async fn command_cleanedshutdown(&self) {
        if self.shared.state() == State::Processing {
            self.shared.set_state(State::EndingProcessing);
            self.command_stopdata();

            let cancel = self.shared.cancel_token();
            for manager in &self.managers {
                tracing::info!(manager = %manager.globalname(), "draining before shutdown");
                while !cancel.is_cancelled()
                    && !(manager.input_queues_empty() && manager.result_queues_empty())
                {
                    let s = manager.snapshot();
                    tracing::info!(
                        manager = %manager.globalname(),
                        input_lp = s.queue_lp_size,
                        input_hp = s.queue_hp_size,
                        result_lp = s.queue_lp_result_size,
                        result_hp = s.queue_hp_result_size,
                        "waiting for queues to drain"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(DRAIN_POLL) => {}
                    }
                }
            }
        } else {
            tracing::warn!(
                state = %self.shared.state(),
                "not in Processing state for a cleaned shutdown, forcing shutdown"
            );
        }

        self.shared.set_state(State::Shutdown);
        self.stop_all(false).await;
    }

    /// Gate the pipeline off, stop every pool, flip `continueall`
    async fn stop_all(&self, fast: bool) {
        tracing::info!(supervisor = %self.globalname, "stopping all workers and managers");

        self.command_stop().await;
        tokio::time::sleep(STOP_SETTLE).await;

        for manager in &self.managers {
            manager.stop(fast).await;
        }

        self.shared.stop_all_loops();
        tracing::info!(supervisor = %self.globalname, "all workers and managers stopped");
    }
}

/// Open one ingress socket, or `None` for `custom` wiring
async fn open_ingress_socket(
    kind: DataSocketKind,
    uri: &str,
) -> Result<Option<IngressSocket>, SupervisorError> {
    match kind {
        DataSocketKind::Custom => Ok(None),
        DataSocketKind::Pushpull => {
            let endpoint = Endpoint::parse(uri)?;
            Ok(Some(IngressSocket::Pull(PullSocket::bind(&endpoint).await?)))
        }
        DataSocketKind::Pubsub => {
            let endpoint = Endpoint::parse(uri)?;
            Ok(Some(IngressSocket::Sub(SubSocket::connect(endpoint))))
        }
    }
}

#[cfg(test)]
#[path = "supervisor_test.rs"]
mod supervisor_test;
