//! Per-supervisor configuration section

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::manager::ManagerConfig;

/// Representation of an item on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataflowKind {
    /// Frames are structured records
    Binary,
    /// Frames are raw strings
    String,
    /// Frames are paths to line-delimited record files
    Filename,
}

/// Ingress socket wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSocketKind {
    /// Ingress pulls and binds
    Pushpull,
    /// Ingress subscribes and connects
    Pubsub,
    /// No ingress sockets; the operator injects items directly
    Custom,
}

/// One `[supervisors.<name>]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Directory where the per-supervisor log file is written
    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    /// Opaque tag reported in the startup line and monitoring
    #[serde(default = "default_processing_type")]
    pub processing_type: String,

    /// Selects the ingress variant
    pub dataflow_type: DataflowKind,

    /// Selects ingress socket wiring
    pub datasocket_type: DataSocketKind,

    /// Endpoint URI for ingress-LP (unused with `custom`)
    #[serde(default)]
    pub data_lp_socket: String,

    /// Endpoint URI for ingress-HP (unused with `custom`)
    #[serde(default)]
    pub data_hp_socket: String,

    /// Endpoint URI for the command subscription
    pub command_socket: String,

    /// Endpoint URI for the monitoring push
    pub monitoring_socket: String,

    /// Worker managers, one entry per manager
    #[serde(default)]
    pub managers: Vec<ManagerConfig>,
}

impl SupervisorConfig {
    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        if self.datasocket_type != DataSocketKind::Custom {
            if self.data_lp_socket.is_empty() {
                return Err(ConfigError::missing_field(
                    "supervisor",
                    name,
                    "data_lp_socket",
                ));
            }
            if self.data_hp_socket.is_empty() {
                return Err(ConfigError::missing_field(
                    "supervisor",
                    name,
                    "data_hp_socket",
                ));
            }
        }

        if self.managers.is_empty() {
            return Err(ConfigError::NoManagers {
                name: name.to_string(),
            });
        }

        for manager in &self.managers {
            manager.validate(name)?;
        }

        Ok(())
    }
}

fn default_logs_path() -> String {
    "logs".to_string()
}

fn default_processing_type() -> String {
    "thread".to_string()
}
