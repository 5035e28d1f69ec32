//! Serves a pre-populated cache in front of an upstream origin.
//!
//! ```text
//! SWCACHE_UPSTREAM=127.0.0.1:8000 RUST_LOG=swcache=debug cargo run --example offline_proxy
//! curl -i http://127.0.0.1:8080/index.html   # cache hit
//! curl -i http://127.0.0.1:8080/app.js       # miss, fetched from the upstream
//! ```

use std::sync::Arc;

use swcache::{Config, FetchInterceptor, HttpNetwork, MemoryCache, Request, Response, Server, StatusCode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swcache=info")),
        )
        .init();

    let config = Config::from_env()?;

    let cache = Arc::new(MemoryCache::new());
    cache
        .put(
            &Request::get("/index.html"),
            Response::new(StatusCode::OK)
                .header("Content-Type", "text/html; charset=utf-8")
                .body("<!doctype html><p>hello from the cache</p>"),
        )
        .await;

    let interceptor = FetchInterceptor::new(cache, Arc::new(HttpNetwork::from_config(&config)));

    let server = Server::bind(&config.listen).await?;
    println!(
        "Listening on http://{} (upstream {})",
        server.local_addr(),
        config.upstream
    );
    server.serve(Arc::new(interceptor)).await?;
    Ok(())
}
