//! Cache capability consulted by the interceptor, and an in-memory store.
//!
//! The interceptor only ever reads through [`CacheStore::lookup`]. Filling a
//! store is the host's business; [`MemoryCache::put`] exists for that.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;
use tracing::debug;

use crate::http::{Request, Response};

mod key;

pub use key::CacheKey;

/// An asynchronous key lookup keyed by request equivalence.
///
/// Implementations must be shareable across tasks: any number of
/// interceptions may look up concurrently.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{future::Future, pin::Pin};
/// use swcache::cache::CacheStore;
/// use swcache::http::{Request, Response};
///
/// struct AlwaysEmpty;
///
/// impl CacheStore for AlwaysEmpty {
///     fn lookup<'a>(
///         &'a self,
///         _request: &'a Request,
///     ) -> Pin<Box<dyn Future<Output = Option<Response>> + Send + 'a>> {
///         Box::pin(async { None })
///     }
/// }
/// ```
pub trait CacheStore: Send + Sync {
    /// Returns the stored response equivalent to `request`, if any.
    fn lookup<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Option<Response>> + Send + 'a>>;
}

/// A process-wide in-memory response store.
///
/// Reads take a shared lock, so lookups never contend with each other.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Response>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `response` under the key of `request`, replacing any previous entry.
    ///
    /// Returns `false` without storing anything when the request is not
    /// cacheable (see [`CacheKey::for_request`]).
    pub async fn put(&self, request: &Request, response: Response) -> bool {
        let Some(key) = CacheKey::for_request(request) else {
            return false;
        };
        debug!(key = %key, status = %response.status(), "cache entry stored");
        self.entries.write().await.insert(key, response);
        true
    }

    /// Removes the entry equivalent to `request`. Returns `true` if one existed.
    pub async fn delete(&self, request: &Request) -> bool {
        match CacheKey::for_request(request) {
            Some(key) => self.entries.write().await.remove(&key).is_some(),
            None => false,
        }
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn lookup<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Option<Response>> + Send + 'a>> {
        Box::pin(async move {
            let key = CacheKey::for_request(request)?;
            self.entries.read().await.get(&key).cloned()
        })
    }
}
