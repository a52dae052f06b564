use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use common::DEFAULT_TELEMETRY_PORT;

/// Where the dual listener binds. UDP and TCP share the same address and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_TELEMETRY_PORT,
        }
    }
}

impl ListenerConfig {
    /// Read `TELEMETRY_BIND` and `TELEMETRY_PORT`, falling back to defaults for
    /// unset variables. Set-but-invalid values are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(bind) = env::var("TELEMETRY_BIND") {
            config.bind_addr = bind
                .parse()
                .with_context(|| format!("TELEMETRY_BIND is not an IP address: {}", bind))?;
        }
        if let Ok(port) = env::var("TELEMETRY_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("TELEMETRY_PORT is not a port number: {}", port))?;
        }

        Ok(config)
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(mut self, bind_addr: Option<IpAddr>, port: Option<u16>) -> Self {
        if let Some(bind_addr) = bind_addr {
            self.bind_addr = bind_addr;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
