use super::{MockServerTrait, ServerConfig, StreamProtocol};
use crate::Result;
use crate::stream::StreamServer;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Binds a server on the configured address and runs it in the background
///
/// Returns the server task, the bound address and the shutdown sender.
/// Bind to port 0 to let the OS pick a free port.
pub async fn spawn_test_server<P>(
    config: P::Config,
) -> Result<(JoinHandle<Result<()>>, SocketAddr, broadcast::Sender<()>)>
where
    P: StreamProtocol + Send + Sync + 'static,
    P::Config: ServerConfig,
{
    let server = StreamServer::<P>::bind(config).await?;
    let addr = server.local_addr();
    let shutdown = server.shutdown_signal();

    let server_handle = tokio::spawn(server.run());

    Ok((server_handle, addr, shutdown))
}
