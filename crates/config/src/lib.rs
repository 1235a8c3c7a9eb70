//! Overseer configuration
//!
//! One TOML document describes any number of supervisor instances,
//! indexed by name. A process loads the document and picks its own
//! section; everything else is ignored, so a fleet can share one file.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use overseer_config::Config;
//! use std::str::FromStr;
//!
//! let toml = r#"
//! [supervisors.RTA1]
//! dataflow_type = "string"
//! datasocket_type = "pushpull"
//! data_lp_socket = "tcp://127.0.0.1:5551"
//! data_hp_socket = "tcp://127.0.0.1:5552"
//! command_socket = "tcp://127.0.0.1:5553"
//! monitoring_socket = "tcp://127.0.0.1:5554"
//!
//! [[supervisors.RTA1.managers]]
//! num_workers = 2
//! result_socket_type = "pushpull"
//! result_dataflow_type = "string"
//! result_lp_socket = "tcp://127.0.0.1:5560"
//! "#;
//!
//! let config = Config::from_str(toml).unwrap();
//! assert!(config.supervisor("RTA1").is_ok());
//! ```

mod error;
mod manager;
mod supervisor;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use manager::{ManagerConfig, ResultSocketKind, NONE_ENDPOINT};
pub use supervisor::{DataSocketKind, DataflowKind, SupervisorConfig};

/// Top-level configuration document
///
/// A named-section document: each `[supervisors.<name>]` block
/// configures one supervisor instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Supervisor sections keyed by supervisor name
    #[serde(default)]
    pub supervisors: BTreeMap<String, SupervisorConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Look up the section for one supervisor
    pub fn supervisor(&self, name: &str) -> Result<&SupervisorConfig> {
        self.supervisors
            .get(name)
            .ok_or_else(|| ConfigError::unknown_supervisor(name))
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every supervisor section
    fn validate(&self) -> Result<()> {
        for (name, section) in &self.supervisors {
            section.validate(name)?;
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
