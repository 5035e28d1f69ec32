use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use swcache::{
    Config, FetchInterceptor, HttpNetwork, MemoryCache, MemorySink, Request, Response, Server,
    StatusCode,
};

/// Minimal origin: answers every connection with a chunked body naming the
/// requested target, then closes.
async fn spawn_origin() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = BytesMut::new();
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    if socket.read_buf(&mut buf).await.unwrap() == 0 {
                        return;
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let target = head.split(' ').nth(1).unwrap_or("?").to_string();
                let body = format!("origin {target}");
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{body}\r\n0\r\n\r\n",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            });
        }
    });

    (addr, hits)
}

async fn spawn_host(interceptor: FetchInterceptor) -> String {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().to_string();
    tokio::spawn(server.serve(Arc::new(interceptor)));
    addr
}

/// Sends `raw` on a fresh connection and reads until the host closes it.
async fn exchange(addr: &str, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn host_serves_hits_and_relays_misses() {
    let (origin, origin_hits) = spawn_origin().await;
    let config = Config {
        upstream: origin,
        ..Config::default()
    };

    let cache = Arc::new(MemoryCache::new());
    cache
        .put(
            &Request::get("/index.html"),
            Response::new(StatusCode::OK)
                .header("Content-Type", "text/html")
                .body("hello"),
        )
        .await;
    let sink = Arc::new(MemorySink::new());
    let interceptor = FetchInterceptor::new(cache, Arc::new(HttpNetwork::from_config(&config)))
        .with_diagnostics(sink.clone());
    let host = spawn_host(interceptor).await;

    let hit = exchange(
        &host,
        "GET /index.html HTTP/1.1\r\nHost: app\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(hit.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(hit.contains("Content-Type: text/html\r\n"));
    assert!(hit.ends_with("\r\n\r\nhello"));
    assert_eq!(origin_hits.load(Ordering::SeqCst), 0);
    assert!(sink.is_empty());

    let miss = exchange(
        &host,
        "GET /app.js?v=3 HTTP/1.1\r\nHost: app\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(miss.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(miss.contains("Content-Length: 18\r\n"));
    assert!(!miss.contains("chunked"));
    assert!(miss.ends_with("\r\n\r\norigin /app.js?v=3"));
    assert_eq!(origin_hits.load(Ordering::SeqCst), 1);
    assert_eq!(sink.lines(), vec!["Fetching".to_string()]);
}

#[tokio::test]
async fn host_keeps_connection_alive_across_requests() {
    let (origin, _) = spawn_origin().await;
    let cache = Arc::new(MemoryCache::new());
    cache
        .put(&Request::get("/a"), Response::new(StatusCode::OK).body("A"))
        .await;
    let host = spawn_host(FetchInterceptor::new(cache, Arc::new(HttpNetwork::new(origin)))).await;

    let reply = exchange(
        &host,
        "GET /a HTTP/1.1\r\nHost: app\r\n\r\nGET /b HTTP/1.1\r\nHost: app\r\nConnection: close\r\n\r\n",
    )
    .await;

    let first = reply.find("\r\n\r\nA").unwrap();
    let second = reply.find("origin /b").unwrap();
    assert!(first < second);
    assert!(reply.contains("Connection: keep-alive\r\n"));
    assert!(reply.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn offline_miss_becomes_bad_gateway() {
    // Reserve a port, then free it so connections are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap().to_string();
    drop(listener);

    let sink = Arc::new(MemorySink::new());
    let interceptor = FetchInterceptor::new(
        Arc::new(MemoryCache::new()),
        Arc::new(HttpNetwork::new(dead.clone())),
    )
    .with_diagnostics(sink.clone());
    let host = spawn_host(interceptor).await;

    let reply = exchange(
        &host,
        "GET /app.js HTTP/1.1\r\nHost: app\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
    assert!(reply.contains(&format!("failed to connect to {dead}")));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let host = spawn_host(FetchInterceptor::new(
        Arc::new(MemoryCache::new()),
        Arc::new(HttpNetwork::new("127.0.0.1:9")),
    ))
    .await;

    let reply = exchange(&host, "NOT A VALID\x01 REQUEST\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn absurd_content_length_gets_413() {
    let host = spawn_host(FetchInterceptor::new(
        Arc::new(MemoryCache::new()),
        Arc::new(HttpNetwork::new("127.0.0.1:9")),
    ))
    .await;

    let reply = exchange(
        &host,
        "POST /upload HTTP/1.1\r\nHost: app\r\nContent-Length: 18446744073709551615\r\n\r\n",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    assert!(reply.contains("Connection: close\r\n"));
}
