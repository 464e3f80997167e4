use crate::http::HttpCodecError;
use std::net::SocketAddr;
use thiserror::Error;

/// Error types for the mocksrv library
#[derive(Error, Debug)]
pub enum MockError {
    /// The listener could not be bound (port in use, insufficient privilege)
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Malformed HTTP request, or a transport failure on an HTTP connection
    #[error("HTTP error: {0}")]
    Http(#[from] HttpCodecError),

    /// WebSocket handshake or session errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// Result type for the mocksrv library
pub type Result<T> = std::result::Result<T, MockError>;

pub mod common;
pub mod http;
pub mod stream;
pub mod ws;

// Re-export main types for convenience
pub use crate::common::{MockServerTrait, ServerConfig, StreamProtocol};
pub use crate::http::{HttpConfig, HttpProtocol, HttpServer};
pub use crate::stream::StreamServer;
pub use crate::ws::{WsConfig, WsProtocol, WsServer};
