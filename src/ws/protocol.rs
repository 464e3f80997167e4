use super::config::WsConfig;
use super::{ECHO_PREFIX, WELCOME_MESSAGE};
use crate::common::StreamProtocol;
use crate::{MockError, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Builds the payload echoed back for an inbound message
pub fn echo_reply(message: &str) -> String {
    format!("{ECHO_PREFIX}{message}")
}

/// WebSocket echo protocol implementation
///
/// Sends a welcome frame as soon as the upgrade completes, then answers
/// every text or binary frame with one text frame, in receipt order.
/// Ping, pong and close handshakes are left to tungstenite.
pub struct WsProtocol;

impl WsProtocol {
    async fn send(
        ws: &mut WebSocketStream<TcpStream>,
        payload: String,
        config: &WsConfig,
    ) -> Result<()> {
        timeout(config.write_timeout, ws.send(Message::text(payload)))
            .await
            .map_err(|_| MockError::Timeout("Write timeout".to_string()))??;
        Ok(())
    }

    async fn session(
        ws: &mut WebSocketStream<TcpStream>,
        addr: SocketAddr,
        config: &WsConfig,
    ) -> Result<()> {
        Self::send(ws, WELCOME_MESSAGE.to_string(), config).await?;

        while let Some(message) = ws.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
                Ok(Message::Close(frame)) => {
                    // Keep polling so the close reply gets flushed
                    debug!(%addr, ?frame, "Close frame received");
                    continue;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed)
                | Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => break,
                Err(e) => return Err(e.into()),
            };

            info!(%addr, message = %text, "Received message");
            Self::send(ws, echo_reply(&text), config).await?;
        }

        Ok(())
    }

    async fn handle_connection(stream: TcpStream, addr: SocketAddr, config: Arc<WsConfig>) -> Result<()> {
        let mut ws = match timeout(config.read_timeout, tokio_tungstenite::accept_async(stream)).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(%addr, "Handshake timeout");
                return Err(MockError::Timeout("WebSocket handshake timeout".to_string()));
            }
        };

        info!(%addr, "Client connected");
        let result = Self::session(&mut ws, addr, &config).await;
        info!(%addr, "Client disconnected");
        result
    }
}

impl StreamProtocol for WsProtocol {
    const NAME: &'static str = "websocket";

    type Config = WsConfig;
    type Error = MockError;

    fn announce(addr: SocketAddr) {
        info!(address = %addr, "WebSocket server is running on {}", addr);
    }

    fn serve(
        stream: TcpStream,
        addr: SocketAddr,
        config: Arc<WsConfig>,
    ) -> impl std::future::Future<Output = std::result::Result<(), MockError>> + Send {
        Self::handle_connection(stream, addr, config)
    }
}
