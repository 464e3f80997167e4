use super::{RESPONSE_BODY, RESPONSE_CONTENT_TYPE};
use ::http::{Method, StatusCode};
use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};
use std::io;
use std::time::Duration;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum number of headers parsed per request
pub const MAX_HEADERS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HttpCodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    Parse(#[from] httparse::Error),
    #[error("Request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("Invalid method")]
    InvalidMethod,
    #[error("Invalid Content-Length header")]
    InvalidContentLength,
    #[error("Unsupported Transfer-Encoding")]
    UnsupportedTransferEncoding,
    #[error("Both Transfer-Encoding and Content-Length present")]
    AmbiguousBodyLength,
    #[error("Invalid chunked body: {0}")]
    InvalidChunk(&'static str),
}

impl HttpCodecError {
    /// Status to answer with before closing, `None` for transport failures
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpCodecError::Io(_) => None,
            HttpCodecError::HeadTooLarge(_)
            | HttpCodecError::Parse(httparse::Error::TooManyHeaders) => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            _ => Some(StatusCode::BAD_REQUEST),
        }
    }
}

/// The parts of a request head that affect how it is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    /// `0` for HTTP/1.0, `1` for HTTP/1.1
    pub minor_version: u8,
    pub keep_alive: bool,
    pub expects_continue: bool,
}

impl RequestHead {
    fn from_request(req: &httparse::Request<'_, '_>) -> Result<Self, HttpCodecError> {
        let method = req
            .method
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .ok_or(HttpCodecError::InvalidMethod)?;
        let minor_version = req.version.unwrap_or(1);

        let mut close = false;
        let mut keep_alive = false;
        let mut expects_continue = false;
        for header in req.headers.iter() {
            if header.name.eq_ignore_ascii_case("connection") {
                for token in header_tokens(header.value) {
                    close |= token.eq_ignore_ascii_case("close");
                    keep_alive |= token.eq_ignore_ascii_case("keep-alive");
                }
            } else if header.name.eq_ignore_ascii_case("expect") {
                expects_continue |= header.value.trim_ascii().eq_ignore_ascii_case(b"100-continue");
            }
        }

        let keep_alive = if minor_version >= 1 { !close } else { keep_alive && !close };

        Ok(Self {
            method,
            minor_version,
            keep_alive,
            expects_continue: expects_continue && minor_version >= 1,
        })
    }

    /// `HEAD` responses carry headers only
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// Items produced by [`HttpCodec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFrame {
    /// A complete request head; the body, if any, follows
    Head(RequestHead),
    /// The body of the last request has been read and discarded
    BodyComplete,
}

/// Responses written by [`HttpCodec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpResponse {
    /// Interim answer to `Expect: 100-continue`
    Continue,
    /// The fixed greeting
    Hello {
        head_only: bool,
        /// Advertised idle timeout, `None` when the connection closes after this response
        keep_alive: Option<Duration>,
    },
    /// Error answer sent before closing the connection
    Reject(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Head,
    Body(u64),
    Chunked(ChunkState),
    Done,
}

/// Request framing for the HTTP responder
///
/// Request bodies are never buffered: they are consumed from the read
/// buffer as they arrive and dropped.
#[derive(Debug)]
pub struct HttpCodec {
    state: DecodeState,
    max_header_size: usize,
}

impl HttpCodec {
    pub fn new(max_header_size: usize) -> Self {
        Self {
            state: DecodeState::Head,
            max_header_size,
        }
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<HttpFrame>, HttpCodecError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_len = match req.parse(src)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => {
                if src.len() > self.max_header_size {
                    return Err(HttpCodecError::HeadTooLarge(self.max_header_size));
                }
                return Ok(None);
            }
        };
        if parsed_len > self.max_header_size {
            return Err(HttpCodecError::HeadTooLarge(self.max_header_size));
        }

        let head = RequestHead::from_request(&req)?;
        let body = body_state(req.headers)?;

        src.advance(parsed_len);
        self.state = body;
        Ok(Some(HttpFrame::Head(head)))
    }

    fn skip_body(src: &mut BytesMut, remaining: u64) -> u64 {
        let n = remaining.min(src.len() as u64);
        // n never exceeds src.len()
        src.advance(n as usize);
        remaining - n
    }
}

impl Decoder for HttpCodec {
    type Item = HttpFrame;
    type Error = HttpCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HttpFrame>, HttpCodecError> {
        loop {
            match self.state {
                DecodeState::Head => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    return self.decode_head(src);
                }
                DecodeState::Body(remaining) => {
                    let remaining = Self::skip_body(src, remaining);
                    if remaining > 0 {
                        self.state = DecodeState::Body(remaining);
                        return Ok(None);
                    }
                    self.state = DecodeState::Done;
                }
                DecodeState::Chunked(ChunkState::Size) => {
                    match httparse::parse_chunk_size(src) {
                        Ok(httparse::Status::Complete((len, 0))) => {
                            src.advance(len);
                            self.state = DecodeState::Chunked(ChunkState::Trailers);
                        }
                        Ok(httparse::Status::Complete((len, size))) => {
                            src.advance(len);
                            self.state = DecodeState::Chunked(ChunkState::Data(size));
                        }
                        Ok(httparse::Status::Partial) => {
                            if src.len() > self.max_header_size {
                                return Err(HttpCodecError::InvalidChunk("chunk size line too long"));
                            }
                            return Ok(None);
                        }
                        Err(_) => return Err(HttpCodecError::InvalidChunk("invalid chunk size")),
                    }
                }
                DecodeState::Chunked(ChunkState::Data(remaining)) => {
                    let remaining = Self::skip_body(src, remaining);
                    if remaining > 0 {
                        self.state = DecodeState::Chunked(ChunkState::Data(remaining));
                        return Ok(None);
                    }
                    self.state = DecodeState::Chunked(ChunkState::DataEnd);
                }
                DecodeState::Chunked(ChunkState::DataEnd) => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(HttpCodecError::InvalidChunk("missing CRLF after chunk data"));
                    }
                    src.advance(2);
                    self.state = DecodeState::Chunked(ChunkState::Size);
                }
                DecodeState::Chunked(ChunkState::Trailers) => {
                    match src.windows(2).position(|w| w == b"\r\n") {
                        // Empty line ends the trailer section
                        Some(0) => {
                            src.advance(2);
                            self.state = DecodeState::Done;
                        }
                        Some(pos) => src.advance(pos + 2),
                        None => {
                            if src.len() > self.max_header_size {
                                return Err(HttpCodecError::HeadTooLarge(self.max_header_size));
                            }
                            return Ok(None);
                        }
                    }
                }
                DecodeState::Done => {
                    self.state = DecodeState::Head;
                    return Ok(Some(HttpFrame::BodyComplete));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<HttpFrame>, HttpCodecError> {
        // A request cut short by the peer closing is dropped without an answer
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<HttpResponse> for HttpCodec {
    type Error = HttpCodecError;

    fn encode(&mut self, item: HttpResponse, dst: &mut BytesMut) -> Result<(), HttpCodecError> {
        match item {
            HttpResponse::Continue => {
                dst.put_slice(b"HTTP/1.1 100 Continue\r\n\r\n");
            }
            HttpResponse::Hello { head_only, keep_alive } => {
                put_status_line(dst, StatusCode::OK);
                put_header(dst, "Content-Type", RESPONSE_CONTENT_TYPE);
                put_header(dst, "Content-Length", &RESPONSE_BODY.len().to_string());
                put_header(dst, "Date", &http_date(Utc::now()));
                match keep_alive {
                    Some(idle) => {
                        put_header(dst, "Connection", "keep-alive");
                        put_header(dst, "Keep-Alive", &format!("timeout={}", idle.as_secs()));
                    }
                    None => put_header(dst, "Connection", "close"),
                }
                dst.put_slice(b"\r\n");
                if !head_only {
                    dst.put_slice(RESPONSE_BODY.as_bytes());
                }
            }
            HttpResponse::Reject(status) => {
                put_status_line(dst, status);
                put_header(dst, "Connection", "close");
                dst.put_slice(b"\r\n");
            }
        }
        Ok(())
    }
}

fn put_status_line(dst: &mut BytesMut, status: StatusCode) {
    let reason = status.canonical_reason().unwrap_or("");
    dst.put_slice(format!("HTTP/1.1 {} {}\r\n", status.as_u16(), reason).as_bytes());
}

fn put_header(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Works out how the request body is framed
fn body_state(headers: &[httparse::Header<'_>]) -> Result<DecodeState, HttpCodecError> {
    let mut content_length: Option<u64> = None;
    let mut chunked = false;
    let mut transfer_encoding = false;

    for header in headers {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            transfer_encoding = true;
            // Only the final coding decides the framing
            chunked = header_tokens(header.value)
                .last()
                .is_some_and(|t| t.eq_ignore_ascii_case("chunked"));
        } else if header.name.eq_ignore_ascii_case("content-length") {
            let len = std::str::from_utf8(header.value.trim_ascii())
                .ok()
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(HttpCodecError::InvalidContentLength)?;
            if content_length.is_some_and(|prev| prev != len) {
                return Err(HttpCodecError::InvalidContentLength);
            }
            content_length = Some(len);
        }
    }

    if transfer_encoding {
        if content_length.is_some() {
            return Err(HttpCodecError::AmbiguousBodyLength);
        }
        return if chunked {
            Ok(DecodeState::Chunked(ChunkState::Size))
        } else {
            Err(HttpCodecError::UnsupportedTransferEncoding)
        };
    }

    Ok(match content_length {
        Some(len) if len > 0 => DecodeState::Body(len),
        _ => DecodeState::Done,
    })
}

fn header_tokens(value: &[u8]) -> impl Iterator<Item = &str> {
    std::str::from_utf8(value)
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
