use super::DEFAULT_PORT;
use crate::common::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the HTTP responder
///
/// # Examples
///
/// ```rust
/// use mocksrv::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("127.0.0.1:0".parse().unwrap())
///     .with_keep_alive_timeout(Duration::from_secs(1));
/// assert_eq!(config.max_header_size, 16 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Time allowed to receive the rest of a request once it has started
    pub read_timeout: Duration,
    /// Time allowed for each response write
    pub write_timeout: Duration,
    /// Idle time after which a keep-alive connection is closed
    pub keep_alive_timeout: Duration,
    /// Largest accepted request head, request line and headers included
    pub max_header_size: usize,
}

impl HttpConfig {
    /// Creates a configuration for the given address with default limits
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

    pub fn with_keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(5),
            max_header_size: 16 * 1024,
        }
    }
}

impl ServerConfig for HttpConfig {
    fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
