//! # swcache
//!
//! An offline-first fetch interceptor. Every request is looked up in a cache
//! first; only misses go to the network, and the network's answer (or its
//! failure) is passed back untouched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swcache::{FetchInterceptor, HttpNetwork, MemoryCache, Request, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(MemoryCache::new());
//!     cache
//!         .put(&Request::get("/index.html"), Response::new(StatusCode::OK).body("hello"))
//!         .await;
//!
//!     let interceptor = Arc::new(FetchInterceptor::new(
//!         cache,
//!         Arc::new(HttpNetwork::new("127.0.0.1:8000")),
//!     ));
//!
//!     // Served from the cache; the network is never touched.
//!     let response = interceptor.dispatch(Request::get("/index.html")).wait().await?;
//!     assert_eq!(response.body_bytes().as_ref(), b"hello");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod http;
pub mod interceptor;
pub mod network;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheKey, CacheStore, MemoryCache};
pub use config::{Config, ConfigError};
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use interceptor::{FetchInterceptor, Interception};
pub use network::{FetchError, HttpNetwork, Network};
pub use server::{Server, ServerError};
