//! Runtime configuration for the host server and the network client.
//!
//! Loaded from JSON or from `SWCACHE_*` environment variables. Every field
//! has a default, so an empty document or environment is a valid config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}

/// Host configuration.
///
/// # Examples
///
/// ```
/// use swcache::config::Config;
///
/// let config = Config::from_json(r#"{ "upstream": "10.0.0.5:8000" }"#).unwrap();
/// assert_eq!(config.upstream, "10.0.0.5:8000");
/// assert_eq!(config.listen, "127.0.0.1:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the host server binds to.
    pub listen: String,
    /// `host:port` that cache misses are fetched from.
    pub upstream: String,
    /// Largest upstream response that will be buffered, in bytes.
    pub max_response_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_owned(),
            upstream: "127.0.0.1:80".to_owned(),
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Config {
    pub const ENV_LISTEN: &'static str = "SWCACHE_LISTEN";
    pub const ENV_UPSTREAM: &'static str = "SWCACHE_UPSTREAM";
    pub const ENV_MAX_RESPONSE_BYTES: &'static str = "SWCACHE_MAX_RESPONSE_BYTES";

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unset variables keep
    /// their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(listen) = lookup(Self::ENV_LISTEN) {
            config.listen = listen;
        }
        if let Some(upstream) = lookup(Self::ENV_UPSTREAM) {
            config.upstream = upstream;
        }
        if let Some(raw) = lookup(Self::ENV_MAX_RESPONSE_BYTES) {
            config.max_response_bytes =
                raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
                    var: Self::ENV_MAX_RESPONSE_BYTES,
                    value: raw.clone(),
                })?;
        }

        Ok(config)
    }
}
