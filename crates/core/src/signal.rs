//! OS signal wiring
//!
//! Signal handlers do no work themselves: each delivered signal is
//! turned into a control event on the supervisor's internal channel and
//! handled by the command loop like any other command. `SIGTERM` asks
//! for a cleaned shutdown; `SIGINT` and the other termination signals
//! shut down immediately.
//!
//! Installation failure is a warning, not an error: the supervisor then
//! simply runs without signal-driven shutdown.

use tokio::sync::mpsc::UnboundedSender;

use overseer_protocol::CommandKind;

use crate::supervisor::ControlEvent;

#[cfg(unix)]
pub(crate) fn install(tx: UnboundedSender<ControlEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = [
        (SignalKind::terminate(), CommandKind::CleanedShutdown, "SIGTERM"),
        (SignalKind::interrupt(), CommandKind::Shutdown, "SIGINT"),
        (SignalKind::quit(), CommandKind::Shutdown, "SIGQUIT"),
        (SignalKind::hangup(), CommandKind::Shutdown, "SIGHUP"),
    ];

    for (kind, command, name) in handlers {
        match signal(kind) {
            Ok(mut stream) => {
                let tx = tx.clone();
                let command = command.clone();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        tracing::info!(signal = name, command = %command, "signal received");
                        if tx.send(ControlEvent::Command(command.clone())).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "failed to install signal handler");
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn install(tx: UnboundedSender<ControlEvent>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(signal = "ctrl-c", "signal received");
            let _ = tx.send(ControlEvent::Command(CommandKind::Shutdown));
        }
    });
}
