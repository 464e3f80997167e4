use crate::common::{MockServerTrait, ServerConfig, StreamProtocol};
use crate::{MockError, Result};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, warn};

/// Pause after an accept error that is not tied to a single connection
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long to wait before accepting again after `e`
///
/// A peer that gave up during the handshake says nothing about the listener.
/// Anything else (typically running out of file descriptors) repeats on every
/// retry until some connection closes.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

/// Generic stream server that works with any stream protocol
///
/// The server owns its listener: `bind` fails fast when the address is
/// unavailable, and `run` accepts connections until the shutdown signal
/// fires. Each connection is served on its own task, so a slow client
/// never holds up the accept loop or any other connection.
///
/// # Examples
///
/// ```no_run
/// use mocksrv::{HttpConfig, HttpServer, MockServerTrait};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = HttpServer::bind(HttpConfig::default()).await?;
///     println!("listening on {}", server.local_addr());
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct StreamServer<P: StreamProtocol> {
    config: Arc<P::Config>,
    listener: TcpListener,
    local_addr: SocketAddr,
    protocol: std::marker::PhantomData<P>,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
    shutdown_rx: tokio::sync::broadcast::Receiver<()>,
}

impl<P: StreamProtocol> StreamServer<P> {
    /// Binds the listener for the given configuration
    pub async fn bind(config: P::Config) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| MockError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MockError::Bind { addr, source })?;

        // Subscribed up front so a signal sent before `run` is not lost
        let (shutdown_signal, shutdown_rx) = tokio::sync::broadcast::channel(1);
        Ok(Self {
            config: Arc::new(config),
            listener,
            local_addr,
            protocol: std::marker::PhantomData,
            shutdown_signal: Arc::new(shutdown_signal),
            shutdown_rx,
        })
    }

    /// Returns the server configuration
    pub fn config(&self) -> &P::Config {
        &self.config
    }
}

#[async_trait]
impl<P> MockServerTrait for StreamServer<P>
where
    P: StreamProtocol + Send + Sync + 'static,
{
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }

    async fn run(mut self) -> Result<()> {
        P::announce(self.local_addr);

        let connection_count = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let current = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(protocol = P::NAME, %addr, current, "Accepted connection");

                            let config = self.config.clone();
                            let connection_count = connection_count.clone();
                            let span = tracing::info_span!("connection", protocol = P::NAME, %addr);

                            tokio::spawn(async move {
                                if let Err(e) = P::serve(stream, addr, config).instrument(span).await {
                                    let e: MockError = e.into();
                                    error!(%addr, error = %e, "Error handling connection");
                                }
                                let current = connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                                debug!(protocol = P::NAME, %addr, current, "Connection closed");
                            });
                        }
                        Err(e) => match accept_backoff(&e) {
                            Some(pause) => {
                                error!(error = %e, backoff_ms = pause.as_millis() as u64, "Failed to accept connection");
                                tokio::time::sleep(pause).await;
                            }
                            None => warn!(error = %e, "Connection dropped before accept"),
                        },
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!(protocol = P::NAME, "Received shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!(protocol = P::NAME, address = %self.local_addr, "Server stopped");
        Ok(())
    }
}
