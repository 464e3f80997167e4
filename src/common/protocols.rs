use crate::MockError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Configuration shared by every stream server
pub trait ServerConfig {
    fn bind_addr(&self) -> SocketAddr;
}

/// A protocol spoken on each accepted TCP connection
///
/// `serve` owns the connection for its whole lifetime; the server never
/// touches the stream again after handing it over.
pub trait StreamProtocol {
    /// Short protocol name used in log lines
    const NAME: &'static str;

    type Config: ServerConfig + Send + Sync + 'static;
    type Error: Into<MockError> + std::fmt::Display + Send;

    /// Logs the startup line once the listener is bound
    fn announce(addr: SocketAddr);

    /// Runs one connection to completion
    fn serve(
        stream: TcpStream,
        addr: SocketAddr,
        config: Arc<Self::Config>,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;
}
