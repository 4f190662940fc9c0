//! Admin API listener settings
//!
//! Read from the `http` object of the service configuration. Every field may
//! be omitted.

use serde::{Deserialize, Serialize};

const LOOPBACK: &str = "127.0.0.1";

/// Admin API port, matching the cluster's admin listener convention
const ADMIN_PORT: u16 = 9644;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Interface the admin API binds to. Loopback unless exposed on purpose.
    #[serde(default = "loopback")]
    pub host: String,

    #[serde(default = "admin_port")]
    pub port: u16,

    /// Origins allowed to call the admin API from a browser. Empty allows any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn loopback() -> String {
    LOOPBACK.to_string()
}

fn admin_port() -> u16 {
    ADMIN_PORT
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: loopback(),
            port: ADMIN_PORT,
            cors_origins: Vec::new(),
        }
    }
}

impl HttpServerConfig {
    /// Loopback listener on `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// `host:port`, as handed to the socket address parser
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
