//! Response snapshots: fluent construction, HTTP/1.1 parsing, and serialization.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{Headers, InvalidStatusCode, Method, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — connection closed early")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing status code")]
    MissingStatus,

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatusCode),

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("malformed chunked body")]
    InvalidChunk,
}

/// An immutable snapshot of a network reply: status, headers, and body.
///
/// The body is a [`Bytes`] buffer, so cloning a `Response` shares the body
/// instead of copying it. Caches hand out clones of their stored snapshot.
///
/// # Examples
///
/// ```
/// use swcache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    /// Upstream `Content-Length` of a relayed `HEAD` reply, whose body is absent.
    declared_length: Option<usize>,
    keep_alive: bool,
}

impl Response {
    /// Maximum number of headers accepted from an upstream response.
    const MAX_HEADERS: usize = 96;

    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            declared_length: None,
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for callers that decorate a response they
    /// did not build.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.declared_length = None;
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Parses a complete HTTP/1.1 response read from a connection that has
    /// been closed by the peer.
    ///
    /// Interim `1xx` heads (other than `101 Switching Protocols`) are skipped;
    /// the snapshot is the final response that follows them.
    ///
    /// The body is framed by `Transfer-Encoding: chunked`, then by
    /// `Content-Length`, and otherwise runs to the end of `buf`. Responses to
    /// `HEAD` and `101`/`204`/`304` responses never carry a body.
    /// Connection-scoped headers are dropped from the snapshot; for `HEAD`
    /// the upstream `Content-Length` is kept and written back by
    /// [`into_bytes`](Self::into_bytes).
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — the head or the framed body is truncated.
    /// - [`ResponseError::Parse`] — the status line or headers are malformed.
    /// - [`ResponseError::InvalidStatus`] — the status code is out of range.
    /// - [`ResponseError::InvalidContentLength`] / [`ResponseError::InvalidChunk`] — bad framing.
    pub fn parse(buf: &[u8], request_method: &Method) -> Result<Self, ResponseError> {
        let mut buf = buf;
        let (status, mut header_map, body_offset) = loop {
            let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
            let mut raw = httparse::Response::new(&mut headers);

            let body_offset = match raw.parse(buf)? {
                httparse::Status::Complete(offset) => offset,
                httparse::Status::Partial => return Err(ResponseError::Incomplete),
            };

            let status = StatusCode::from_u16(raw.code.ok_or(ResponseError::MissingStatus)?)?;
            if status.is_interim() {
                buf = &buf[body_offset..];
                continue;
            }

            let mut header_map = Headers::with_capacity(raw.headers.len());
            for header in raw.headers.iter() {
                if let Ok(value) = std::str::from_utf8(header.value) {
                    header_map.insert(header.name, value);
                }
            }
            break (status, header_map, body_offset);
        };

        let rest = &buf[body_offset..];
        let code = status.as_u16();
        let is_head = *request_method == Method::Head;
        let bodyless = is_head || code < 200 || code == 204 || code == 304;

        let declared_length = if is_head {
            match header_map.get("content-length") {
                Some(len) => Some(
                    len.trim()
                        .parse::<usize>()
                        .map_err(|_| ResponseError::InvalidContentLength)?,
                ),
                None => None,
            }
        } else {
            None
        };

        let body = if bodyless {
            Bytes::new()
        } else if header_map.has_token("transfer-encoding", "chunked") {
            decode_chunked(rest)?
        } else if let Some(len) = header_map.get("content-length") {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| ResponseError::InvalidContentLength)?;
            if rest.len() < len {
                return Err(ResponseError::Incomplete);
            }
            Bytes::copy_from_slice(&rest[..len])
        } else {
            Bytes::copy_from_slice(rest)
        };

        header_map.strip_hop_by_hop();
        Ok(Self {
            status,
            headers: header_map,
            body,
            declared_length,
            keep_alive: true,
        })
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written; for a relayed `HEAD` reply this
    ///   is the upstream length rather than the empty body's).
    /// - `Connection: keep-alive` or `Connection: close`.
    ///
    /// Any connection-scoped headers already present are replaced.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.declared_length.unwrap_or(self.body.len());

        self.headers.strip_hop_by_hop();
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        buf.put(self.headers.to_string().as_bytes());
        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body);

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

/// Decodes a `Transfer-Encoding: chunked` body. Trailer fields are discarded.
fn decode_chunked(mut buf: &[u8]) -> Result<Bytes, ResponseError> {
    let mut out = BytesMut::new();
    loop {
        let (consumed, size) = match httparse::parse_chunk_size(buf) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Err(ResponseError::Incomplete),
            Err(_) => return Err(ResponseError::InvalidChunk),
        };
        buf = &buf[consumed..];

        if size == 0 {
            return Ok(out.freeze());
        }

        let size = usize::try_from(size).map_err(|_| ResponseError::InvalidChunk)?;
        if buf.len() < size + 2 {
            return Err(ResponseError::Incomplete);
        }
        out.put(&buf[..size]);
        if &buf[size..size + 2] != b"\r\n" {
            return Err(ResponseError::InvalidChunk);
        }
        buf = &buf[size + 2..];
    }
}
