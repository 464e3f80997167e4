use super::codec::{HttpCodec, HttpCodecError, HttpFrame, HttpResponse, RequestHead};
use super::config::HttpConfig;
use crate::common::StreamProtocol;
use crate::{MockError, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// HTTP protocol implementation for the mock responder
///
/// Every request gets the same `200 OK` greeting. Connections are kept
/// alive following the usual HTTP/1.x rules and requests pipelined on
/// one connection are answered in order.
pub struct HttpProtocol;

type HttpFramed = Framed<TcpStream, HttpCodec>;

enum Next {
    Frame(HttpFrame),
    Closed,
}

impl HttpProtocol {
    /// Waits for the next decoded frame, `Ok(None)` on timeout
    async fn next_frame(
        framed: &mut HttpFramed,
        addr: SocketAddr,
        wait: std::time::Duration,
    ) -> std::result::Result<Option<Next>, HttpCodecError> {
        match timeout(wait, framed.next()).await {
            Ok(Some(Ok(frame))) => Ok(Some(Next::Frame(frame))),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Ok(Some(Next::Closed)),
            Err(_) => {
                debug!(%addr, "Read timeout");
                Ok(None)
            }
        }
    }

    /// Waits for the next request head
    ///
    /// An idle connection gets `keep_alive_timeout`. Once part of a head has
    /// arrived the client gets a further `read_timeout` to finish it.
    async fn next_head(
        framed: &mut HttpFramed,
        addr: SocketAddr,
        config: &HttpConfig,
    ) -> std::result::Result<Option<Next>, HttpCodecError> {
        match Self::next_frame(framed, addr, config.keep_alive_timeout).await? {
            None if !framed.read_buffer().is_empty() => {
                debug!(%addr, buffered = framed.read_buffer().len(), "Request head in progress");
                Self::next_frame(framed, addr, config.read_timeout).await
            }
            next => Ok(next),
        }
    }

    /// Writes one response, returning `false` if the write timed out
    async fn send(
        framed: &mut HttpFramed,
        addr: SocketAddr,
        response: HttpResponse,
        config: &HttpConfig,
    ) -> Result<bool> {
        match timeout(config.write_timeout, framed.send(response)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(%addr, "Write timeout");
                Ok(false)
            }
        }
    }

    /// Answers a request the codec could not frame, then gives up on the connection
    async fn reject(
        framed: &mut HttpFramed,
        addr: SocketAddr,
        err: HttpCodecError,
        config: &HttpConfig,
    ) -> Result<()> {
        let Some(status) = err.status() else {
            return Err(err.into());
        };
        warn!(%addr, error = %err, status = status.as_u16(), "Rejecting malformed request");
        Self::send(framed, addr, HttpResponse::Reject(status), config).await?;
        Ok(())
    }

    async fn handle_connection(stream: TcpStream, addr: SocketAddr, config: Arc<HttpConfig>) -> Result<()> {
        let mut framed = Framed::new(stream, HttpCodec::new(config.max_header_size));

        loop {
            // Idle keep-alive connections are closed quietly
            let head: RequestHead = match Self::next_head(&mut framed, addr, &config).await {
                Ok(Some(Next::Frame(HttpFrame::Head(head)))) => head,
                Ok(Some(Next::Frame(HttpFrame::BodyComplete))) => continue,
                Ok(Some(Next::Closed)) => break,
                Ok(None) => {
                    if !framed.read_buffer().is_empty() {
                        warn!(%addr, "Read timeout");
                    }
                    break;
                }
                Err(e) => return Self::reject(&mut framed, addr, e, &config).await,
            };

            debug!(%addr, method = %head.method, keep_alive = head.keep_alive, "Request received");

            if head.expects_continue
                && !Self::send(&mut framed, addr, HttpResponse::Continue, &config).await?
            {
                break;
            }

            // The body is read and discarded before answering
            loop {
                match Self::next_frame(&mut framed, addr, config.read_timeout).await {
                    Ok(Some(Next::Frame(HttpFrame::BodyComplete))) => break,
                    Ok(Some(Next::Frame(HttpFrame::Head(_)))) => continue,
                    Ok(Some(Next::Closed)) => return Ok(()),
                    Ok(None) => {
                        warn!(%addr, "Read timeout");
                        return Ok(());
                    }
                    Err(e) => return Self::reject(&mut framed, addr, e, &config).await,
                }
            }

            let response = HttpResponse::Hello {
                head_only: head.is_head(),
                keep_alive: head.keep_alive.then_some(config.keep_alive_timeout),
            };
            if !Self::send(&mut framed, addr, response, &config).await? || !head.keep_alive {
                break;
            }
        }

        Ok(())
    }
}

impl StreamProtocol for HttpProtocol {
    const NAME: &'static str = "http";

    type Config = HttpConfig;
    type Error = MockError;

    fn announce(addr: SocketAddr) {
        info!(address = %addr, "Server running at http://{}/", addr);
    }

    fn serve(
        stream: TcpStream,
        addr: SocketAddr,
        config: Arc<HttpConfig>,
    ) -> impl std::future::Future<Output = std::result::Result<(), MockError>> + Send {
        Self::handle_connection(stream, addr, config)
    }
}
