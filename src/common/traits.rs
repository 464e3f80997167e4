use crate::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

/// Common trait for mock servers
///
/// A server owns its bound listener from construction until `run`
/// returns, so callers can read the bound address and grab a shutdown
/// handle before handing the server off to a task.
#[async_trait]
pub trait MockServerTrait: Sized {
    /// Address the listener is actually bound to
    fn local_addr(&self) -> SocketAddr;

    /// Returns a shutdown signal sender that stops the accept loop
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;

    /// Accepts connections until the shutdown signal fires
    async fn run(self) -> Result<()>;
}
