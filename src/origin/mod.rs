//! Origin Module
//!
//! The expensive side of the cache: whatever produces a value on a miss.

mod clock;
mod http;

use async_trait::async_trait;

use crate::error::Result;

pub use clock::ClockOrigin;
pub use http::HttpOrigin;

// == Origin Fetcher ==
/// Produces the value for a key on a cache miss.
///
/// Implementations must tolerate concurrent calls for different keys. The
/// cache store guarantees at most one call per key at a time, not globally.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<String>;
}
