//! Outgoing request descriptor, plus HTTP/1.1 parsing and serialization.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("request body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },
}

/// An immutable descriptor of one outgoing network call.
///
/// A `Request` is the lookup key for the cache and the argument handed to
/// the network on a miss. Build one with [`Request::new`] and the builder
/// methods, or parse one off the wire with [`Request::parse`].
///
/// # Examples
///
/// ```
/// use swcache::http::{Method, Request};
///
/// let request = Request::get("/search?q=rust").header("Accept", "text/html");
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query_string(), Some("q=rust"));
/// assert_eq!(request.target(), "/search?q=rust");
///
/// let raw = b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (parsed, _offset) = Request::parse(raw).unwrap();
/// assert_eq!(parsed.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Largest `Content-Length` accepted by [`Request::parse`] (4 MiB).
    pub const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

    /// Creates an HTTP/1.1 request for `target` (`/path` or `/path?query`).
    pub fn new(method: impl Into<Method>, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: method.into(),
            path,
            query,
            version: 1,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for `Request::new(Method::Get, target)`.
    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator). The
    /// body holds at most `Content-Length` bytes; callers check
    /// [`content_length`](Self::content_length) to know whether it is complete.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    /// - [`RequestError::InvalidContentLength`] — `Content-Length` is not a number.
    /// - [`RequestError::BodyTooLarge`] — `Content-Length` exceeds [`MAX_BODY_SIZE`](Self::MAX_BODY_SIZE).
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = Method::from(
            raw_req
                .method
                .ok_or(RequestError::MissingField { field: "method" })?,
        );
        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let declared = match header_map.get("content-length") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidContentLength)?,
            None => 0,
        };
        if declared > Self::MAX_BODY_SIZE {
            return Err(RequestError::BodyTooLarge {
                max_bytes: Self::MAX_BODY_SIZE,
            });
        }
        let body_end = buf.len().min(body_offset + declared);
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        let (path, query) = split_target(target);
        Ok((
            Self {
                method,
                path,
                query,
                version,
                headers: header_map,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the request target as sent on the wire: path plus `?query`.
    pub fn target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body bytes.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    /// Serializes the request for a single-use upstream connection.
    ///
    /// Connection-scoped headers are replaced: the request always carries
    /// `Connection: close` and an exact `Content-Length` when a body is present.
    /// `authority` is used as the `Host` header unless the request already has one.
    pub fn to_bytes(&self, authority: &str) -> BytesMut {
        let mut headers = self.headers.clone();
        headers.strip_hop_by_hop();
        if !headers.contains("host") {
            headers.insert("Host", authority);
        }
        headers.set("Connection", "close");

        let target = self.target();
        let mut buf = BytesMut::with_capacity(64 + target.len() + headers.len() * 48 + self.body.len());
        buf.put(format!("{} {} HTTP/1.1\r\n", self.method, target).as_bytes());
        buf.put(headers.to_string().as_bytes());
        if !self.body.is_empty() {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_ref());
        buf
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (target.to_owned(), None),
    }
}
