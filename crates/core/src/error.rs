//! Runtime error types

use thiserror::Error;

/// Errors that abort supervisor startup
///
/// Once the supervisor is running, errors are handled at the nearest
/// loop boundary and never surface through this type.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] overseer_config::ConfigError),

    /// A socket could not be created or bound
    #[error(transparent)]
    Transport(#[from] overseer_transport::TransportError),

    /// A manager names a worker variant this build does not provide
    #[error("unknown worker variant '{variant}' for manager '{manager}'")]
    UnknownWorkerVariant { variant: String, manager: String },
}
