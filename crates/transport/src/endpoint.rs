//! Endpoint URIs
//!
//! Endpoints are written as `tcp://host:port`. Only the `tcp` scheme is
//! recognised; anything else is a configuration mistake worth failing
//! loudly at startup.

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// A parsed `tcp://host:port` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse an endpoint URI
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let rest = uri
            .strip_prefix("tcp://")
            .ok_or(TransportError::InvalidEndpoint {
                uri: uri.to_string(),
                reason: "expected tcp:// scheme",
            })?;

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or(TransportError::InvalidEndpoint {
                uri: uri.to_string(),
                reason: "missing port",
            })?;

        if host.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                uri: uri.to_string(),
                reason: "missing host",
            });
        }

        let port = port.parse().map_err(|_| TransportError::InvalidEndpoint {
            uri: uri.to_string(),
            reason: "invalid port",
        })?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The `host:port` form used for bind/connect calls
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Endpoint port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}
