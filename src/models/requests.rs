//! Request DTOs for the edge cache API
//!
//! Defines the shape of inbound requests.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{CacheError, Result};

/// Query string of `GET /cache`
///
/// # Fields
/// - `key`: identifies the cached resource; optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheQuery {
    #[serde(default)]
    pub key: Option<String>,
}

impl CacheQuery {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    /// Derives the cache key for this request.
    ///
    /// A missing or empty `key` falls back to `default_key`, so every such
    /// request shares one cache entry with `key=<default_key>`.
    pub fn cache_key<'a>(&'a self, default_key: &'a str) -> Result<&'a str> {
        let key = match self.key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => default_key,
        };

        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::MalformedRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(key)
    }
}
