//! Network capability used on a cache miss, and an HTTP/1.1 client over TCP.
//!
//! [`HttpNetwork`] opens one connection per fetch to a fixed upstream
//! authority, sends the request with `Connection: close`, and reads the reply
//! until the peer closes. There are no retries and no timeouts: whatever the
//! socket reports is what the caller gets.

use std::future::Future;
use std::pin::Pin;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::Config;
use crate::http::response::ResponseError;
use crate::http::{Request, Response};

/// Ways a live network call can fail.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed upstream response: {0}")]
    Malformed(#[from] ResponseError),

    #[error("upstream response exceeds maximum allowed size of {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },

    #[error("interception task ended without a response")]
    Aborted,
}

/// Performs a live network call for a request.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{future::Future, pin::Pin};
/// use swcache::http::{Request, Response, StatusCode};
/// use swcache::network::{FetchError, Network};
///
/// struct Canned;
///
/// impl Network for Canned {
///     fn fetch(
///         &self,
///         _request: Request,
///     ) -> Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send + '_>> {
///         Box::pin(async { Ok(Response::new(StatusCode::OK).body("canned")) })
///     }
/// }
/// ```
pub trait Network: Send + Sync {
    /// Sends `request` and resolves with the reply or the failure.
    fn fetch(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send + '_>>;
}

/// Initial read buffer capacity per upstream connection.
const INITIAL_BUF_SIZE: usize = 8192;

/// HTTP/1.1 client bound to one upstream authority (`host:port`).
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    upstream: String,
    max_response_bytes: usize,
}

impl HttpNetwork {
    /// Creates a client for `upstream`, using the default response size limit.
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            max_response_bytes: Config::default().max_response_bytes,
        }
    }

    /// Creates a client from the `upstream` and `max_response_bytes` settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            upstream: config.upstream.clone(),
            max_response_bytes: config.max_response_bytes,
        }
    }

    /// Caps the size of a buffered upstream response (head plus body).
    #[must_use]
    pub fn max_response_bytes(mut self, max_bytes: usize) -> Self {
        self.max_response_bytes = max_bytes;
        self
    }

    /// Returns the upstream authority.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    async fn send(&self, request: Request) -> Result<Response, FetchError> {
        let mut stream =
            TcpStream::connect(self.upstream.as_str())
                .await
                .map_err(|e| FetchError::Connect {
                    addr: self.upstream.clone(),
                    source: e,
                })?;

        debug!(
            upstream = %self.upstream,
            method = %request.method(),
            target = %request.target(),
            "sending upstream request"
        );

        stream.write_all(&request.to_bytes(&self.upstream)).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
        loop {
            if stream.read_buf(&mut buf).await? == 0 {
                break;
            }
            if buf.len() > self.max_response_bytes {
                return Err(FetchError::ResponseTooLarge {
                    max_bytes: self.max_response_bytes,
                });
            }
        }

        let response = Response::parse(&buf, request.method())?;
        debug!(
            upstream = %self.upstream,
            status = %response.status(),
            bytes = buf.len(),
            "upstream response received"
        );
        Ok(response)
    }
}

impl Network for HttpNetwork {
    fn fetch(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};
    use tokio::net::TcpListener;

    /// Accepts one connection, captures the request head, and replies with `reply`.
    async fn one_shot_upstream(reply: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                if socket.read_buf(&mut buf).await.unwrap() == 0 {
                    break;
                }
            }
            socket.write_all(reply).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(buf.to_vec()).unwrap()
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn fetches_content_length_response() {
        let (addr, upstream) =
            one_shot_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await;
        let network = HttpNetwork::new(addr.clone());

        let response = network.fetch(Request::get("/index.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes().as_ref(), b"hello");

        let head = upstream.await.unwrap();
        assert!(head.starts_with("GET /index.html HTTP/1.1\r\n"));
        assert!(head.contains(&format!("Host: {addr}\r\n")));
        assert!(head.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn fetches_chunked_response() {
        let (addr, _upstream) = one_shot_upstream(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\napp\r\n3\r\n.js\r\n0\r\n\r\n",
        )
        .await;
        let response = HttpNetwork::new(addr)
            .fetch(Request::get("/app.js"))
            .await
            .unwrap();
        assert_eq!(response.body_bytes().as_ref(), b"app.js");
        assert!(!response.headers().contains("transfer-encoding"));
    }

    #[tokio::test]
    async fn head_relay_keeps_upstream_length() {
        let (addr, _upstream) =
            one_shot_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n").await;
        let response = HttpNetwork::new(addr)
            .fetch(Request::new(Method::Head, "/video.mp4"))
            .await
            .unwrap();
        assert!(response.body_bytes().is_empty());

        let wire = String::from_utf8(response.into_bytes().to_vec()).unwrap();
        assert!(wire.contains("Content-Length: 1234\r\n"));
    }

    #[tokio::test]
    async fn connection_refused_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = HttpNetwork::new(addr.clone())
            .fetch(Request::get("/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Connect { addr: ref a, .. } if *a == addr));
    }

    #[tokio::test]
    async fn oversized_response_is_rejected() {
        let (addr, _upstream) =
            one_shot_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\n\r\n0123456789012345678901234567890123456789012345678901234567890123").await;
        let err = HttpNetwork::new(addr)
            .max_response_bytes(32)
            .fetch(Request::new(Method::Get, "/big"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge { max_bytes: 32 }));
    }

    #[tokio::test]
    async fn truncated_response_is_malformed() {
        let (addr, _upstream) =
            one_shot_upstream(b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\nshort").await;
        let err = HttpNetwork::new(addr)
            .fetch(Request::get("/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Malformed(ResponseError::Incomplete)
        ));
    }
}
