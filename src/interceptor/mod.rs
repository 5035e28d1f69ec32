//! The fetch interceptor: answer from the cache, fall back to the network.
//!
//! Every intercepted request takes one of three paths:
//!
//! | Cache  | Network | Result                                  |
//! |--------|---------|-----------------------------------------|
//! | hit    | —       | the cached [`Response`]                 |
//! | miss   | ok      | the network's [`Response`]              |
//! | miss   | failed  | the network's [`FetchError`], unchanged |
//!
//! A miss emits one `"Fetching"` line on the injected [`DiagnosticSink`].
//! Responses fetched on a miss are not written back to the cache.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::http::{Request, Response};
use crate::network::{FetchError, Network};

/// Line emitted on every cache miss, just before the network call.
pub const MISS_DIAGNOSTIC: &str = "Fetching";

/// Routes requests through a cache before they reach the network.
///
/// The interceptor holds no mutable state of its own; it can be shared via
/// [`Arc`] and driven from any number of tasks at once.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use swcache::{FetchInterceptor, MemoryCache, HttpNetwork, Request};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let interceptor = FetchInterceptor::new(
///         Arc::new(MemoryCache::new()),
///         Arc::new(HttpNetwork::new("127.0.0.1:8000")),
///     );
///     let response = interceptor.intercept(Request::get("/index.html")).await?;
///     println!("{}", response.status());
///     Ok(())
/// }
/// ```
pub struct FetchInterceptor {
    cache: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl FetchInterceptor {
    /// Creates an interceptor that reports misses through [`TracingSink`].
    pub fn new(cache: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        Self {
            cache,
            network,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Replaces the diagnostic sink.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Answers one request.
    ///
    /// # Errors
    ///
    /// On a cache miss, returns whatever error the network call produced.
    pub async fn intercept(&self, request: Request) -> Result<Response, FetchError> {
        if let Some(cached) = self.cache.lookup(&request).await {
            debug!(
                method = %request.method(),
                target = %request.target(),
                status = %cached.status(),
                "cache hit"
            );
            return Ok(cached);
        }

        debug!(method = %request.method(), target = %request.target(), "cache miss");
        self.diagnostics.emit(MISS_DIAGNOSTIC);
        self.network.fetch(request).await
    }

    /// Handles `request` on its own task and returns a handle to its result.
    ///
    /// The task runs to completion even if the [`Interception`] is dropped;
    /// its result is then discarded.
    pub fn dispatch(self: &Arc<Self>, request: Request) -> Interception {
        let (tx, rx) = oneshot::channel();
        let interceptor = Arc::clone(self);

        tokio::spawn(async move {
            let result = interceptor.intercept(request).await;
            if tx.send(result).is_err() {
                debug!("interception result dropped, caller went away");
            }
        });

        Interception { rx }
    }
}

/// The pending result of a [`FetchInterceptor::dispatch`] call.
#[derive(Debug)]
pub struct Interception {
    rx: oneshot::Receiver<Result<Response, FetchError>>,
}

impl Interception {
    /// Waits for the interception to resolve.
    ///
    /// # Errors
    ///
    /// The network failure on a miss, or [`FetchError::Aborted`] if the task
    /// ended without answering (e.g. a panicking cache or network).
    pub async fn wait(self) -> Result<Response, FetchError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => {
                warn!("interception task ended without a response");
                Err(FetchError::Aborted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    use crate::cache::MemoryCache;
    use crate::diagnostics::MemorySink;
    use crate::http::StatusCode;

    struct PanickingNetwork;

    async fn explode() -> Result<Response, FetchError> {
        panic!("network exploded")
    }

    impl Network for PanickingNetwork {
        fn fetch(
            &self,
            _request: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send + '_>> {
            Box::pin(explode())
        }
    }

    #[tokio::test]
    async fn dispatch_reports_abort_when_task_dies() {
        let interceptor = Arc::new(FetchInterceptor::new(
            Arc::new(MemoryCache::new()),
            Arc::new(PanickingNetwork),
        ));
        let err = interceptor
            .dispatch(Request::get("/boom"))
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Aborted));
    }

    #[tokio::test]
    async fn hit_skips_diagnostics() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .put(&Request::get("/"), Response::new(StatusCode::OK))
            .await;
        let sink = Arc::new(MemorySink::new());
        let interceptor = FetchInterceptor::new(cache, Arc::new(PanickingNetwork))
            .with_diagnostics(sink.clone());

        let response = interceptor.intercept(Request::get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.is_empty());
    }
}
