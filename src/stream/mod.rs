//! Generic stream server
//!
//! This module provides the accept loop shared by the HTTP responder and
//! the WebSocket echo service. The per-connection behaviour is supplied
//! by a `StreamProtocol` implementation.

pub mod server;

pub use server::StreamServer;
