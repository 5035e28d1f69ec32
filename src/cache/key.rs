//! Request-equivalence keys.

use std::fmt;

use crate::http::{Method, Request};

/// Identifies which stored response a request is equivalent to.
///
/// Two requests are equivalent when they target the same URL (path plus
/// query). Only `GET` requests are keyed; everything else is never served
/// from the cache.
///
/// # Examples
///
/// ```
/// use swcache::cache::CacheKey;
/// use swcache::http::{Method, Request};
///
/// let a = CacheKey::for_request(&Request::get("/app.js?v=2")).unwrap();
/// let b = CacheKey::for_request(&Request::get("/app.js?v=2").header("Accept", "*/*")).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "/app.js?v=2");
///
/// assert!(CacheKey::for_request(&Request::new(Method::Post, "/app.js")).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    url: String,
}

impl CacheKey {
    /// Derives the key for `request`, or `None` if the request is not cacheable.
    pub fn for_request(request: &Request) -> Option<Self> {
        if *request.method() != Method::Get {
            return None;
        }
        Some(Self {
            url: request.target(),
        })
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
