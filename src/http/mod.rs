//! HTTP responder
//!
//! This module provides a mock HTTP server that answers every request,
//! whatever its method, path, headers or body, with `200 OK`,
//! `Content-Type: text/plain` and the body `Hello, World!\n`.

pub mod codec;
pub mod config;
pub mod protocol;


use crate::stream::StreamServer;
pub use codec::{HttpCodec, HttpCodecError, HttpFrame, HttpResponse, RequestHead};
pub use config::HttpConfig;
pub use protocol::HttpProtocol;

/// Body sent with every successful response
pub const RESPONSE_BODY: &str = "Hello, World!\n";
/// Content type sent with every successful response
pub const RESPONSE_CONTENT_TYPE: &str = "text/plain";
/// Port the responder listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 8081;

/// Type alias for the HTTP responder
pub type HttpServer = StreamServer<HttpProtocol>;
