//! Supervisor state and shared run flags

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Top-level supervisor state
///
/// `Shutdown` is terminal; re-entry requires a fresh process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initialised,
    Waiting,
    Processing,
    EndingProcessing,
    Shutdown,
}

impl State {
    /// Name reported in monitoring messages
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Initialised => "Initialised",
            State::Waiting => "Waiting",
            State::Processing => "Processing",
            State::EndingProcessing => "EndingProcessing",
            State::Shutdown => "Shutdown",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags and state shared by every task of one supervisor
///
/// The state cell and both flags are written only by the command and
/// signal paths; everything else reads. `continueall` is realised as a
/// cancellation token so blocking points can select against it.
pub struct SharedState {
    state: Mutex<State>,
    cancel: CancellationToken,
    stopdata: AtomicBool,
}

impl SharedState {
    /// Fresh state: `Initialised`, running, ingress gated closed
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Initialised),
            cancel: CancellationToken::new(),
            stopdata: AtomicBool::new(true),
        }
    }

    /// Current supervisor state
    pub fn state(&self) -> State {
        *self.state.lock()
    }

    /// Replace the supervisor state
    pub fn set_state(&self, state: State) {
        *self.state.lock() = state;
    }

    /// The master run flag, inverted: cancelled means `continueall=false`
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the supervisor is still running
    pub fn continue_all(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Flip the master run flag off; every loop exits at its next
    /// blocking-point boundary
    pub fn stop_all_loops(&self) {
        self.cancel.cancel();
    }

    /// Whether ingress is gated closed
    pub fn stopdata(&self) -> bool {
        self.stopdata.load(Ordering::Relaxed)
    }

    /// Open or close the ingress gate
    pub fn set_stopdata(&self, stopdata: bool) {
        self.stopdata.store(stopdata, Ordering::Relaxed);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
