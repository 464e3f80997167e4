//! Common traits and types used across the mocksrv library
//!
//! This module contains the core traits that define the interface
//! between the generic accept loop and the per-connection protocols.

pub mod protocols;
pub mod test_utils;
pub mod traits;

pub use protocols::{ServerConfig, StreamProtocol};
pub use test_utils::spawn_test_server;
pub use traits::MockServerTrait;
