//! Per-manager configuration

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::supervisor::DataflowKind;

/// Sentinel endpoint meaning "this class has no output sink; discard"
pub const NONE_ENDPOINT: &str = "none";

/// Result socket wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSocketKind {
    /// Results push and connect
    Pushpull,
    /// Results publish and bind
    Pubsub,
}

/// One `[[supervisors.<name>.managers]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Manager name, appended to the supervisor name
    #[serde(default = "default_manager_name")]
    pub name: String,

    /// Size of the worker pool started for this manager
    pub num_workers: usize,

    /// Which worker variant the pool runs
    #[serde(default = "default_worker_variant")]
    pub worker_variant: String,

    /// Wiring of the result sockets
    pub result_socket_type: ResultSocketKind,

    /// Representation of results on the wire
    pub result_dataflow_type: DataflowKind,

    /// Endpoint URI for result-LP, or `"none"` to discard
    #[serde(default = "default_none")]
    pub result_lp_socket: String,

    /// Endpoint URI for result-HP, or `"none"` to discard
    #[serde(default = "default_none")]
    pub result_hp_socket: String,
}

impl ManagerConfig {
    /// LP result endpoint, unless disabled with `"none"`
    pub fn result_lp_endpoint(&self) -> Option<&str> {
        endpoint_or_none(&self.result_lp_socket)
    }

    /// HP result endpoint, unless disabled with `"none"`
    pub fn result_hp_endpoint(&self) -> Option<&str> {
        endpoint_or_none(&self.result_hp_socket)
    }

    pub(crate) fn validate(&self, supervisor: &str) -> Result<()> {
        let name = format!("{}/{}", supervisor, self.name);

        if self.num_workers == 0 {
            return Err(ConfigError::invalid_value(
                "manager",
                name,
                "num_workers",
                "must be at least 1",
            ));
        }

        if self.worker_variant.is_empty() {
            return Err(ConfigError::missing_field(
                "manager",
                name,
                "worker_variant",
            ));
        }

        Ok(())
    }
}

fn endpoint_or_none(value: &str) -> Option<&str> {
    (value != NONE_ENDPOINT && !value.is_empty()).then_some(value)
}

fn default_manager_name() -> String {
    "Generic".to_string()
}

fn default_worker_variant() -> String {
    "echo".to_string()
}

fn default_none() -> String {
    NONE_ENDPOINT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(lp: &str, hp: &str) -> ManagerConfig {
        ManagerConfig {
            name: "Generic".into(),
            num_workers: 1,
            worker_variant: "echo".into(),
            result_socket_type: ResultSocketKind::Pushpull,
            result_dataflow_type: DataflowKind::String,
            result_lp_socket: lp.into(),
            result_hp_socket: hp.into(),
        }
    }

    #[test]
    fn test_none_sentinel_disables_endpoint() {
        let m = manager("tcp://127.0.0.1:5560", "none");
        assert_eq!(m.result_lp_endpoint(), Some("tcp://127.0.0.1:5560"));
        assert!(m.result_hp_endpoint().is_none());
    }

    #[test]
    fn test_empty_endpoint_counts_as_none() {
        let m = manager("", "");
        assert!(m.result_lp_endpoint().is_none());
        assert!(m.result_hp_endpoint().is_none());
    }

    #[test]
    fn test_zero_workers_invalid() {
        let mut m = manager("none", "none");
        m.num_workers = 0;
        assert!(m.validate("RTA1").is_err());
    }
}
