use super::DEFAULT_PORT;
use crate::common::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the WebSocket echo service
///
/// `read_timeout` bounds the upgrade handshake only; an established
/// session may stay idle indefinitely.
///
/// # Examples
///
/// ```rust
/// use mocksrv::ws::WsConfig;
///
/// let config = WsConfig::default();
/// assert_eq!(config.bind_addr.port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Time allowed to complete the upgrade handshake
    pub read_timeout: Duration,
    /// Time allowed for each outbound frame
    pub write_timeout: Duration,
}

impl WsConfig {
    /// Creates a configuration for the given address with default timeouts
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig for WsConfig {
    fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
