//! WebSocket echo service
//!
//! This module provides a mock WebSocket server that greets every client
//! and answers each message with `You said: ` followed by the message.

pub mod config;
pub mod protocol;


use crate::stream::StreamServer;
pub use config::WsConfig;
pub use protocol::{WsProtocol, echo_reply};

/// First frame sent on every new connection
pub const WELCOME_MESSAGE: &str = "Welcome to the WebSocket server!";
/// Prefix put in front of every echoed message
pub const ECHO_PREFIX: &str = "You said: ";
/// Port the echo service listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 8080;

/// Type alias for the WebSocket echo server
pub type WsServer = StreamServer<WsProtocol>;
