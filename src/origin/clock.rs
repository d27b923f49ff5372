//! Clock origin: answers every key with the time the value was produced.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::debug;

use super::OriginFetcher;
use crate::error::Result;

/// Origin that returns the current UTC time as an RFC 3339 timestamp.
///
/// Repeated responses carrying the same timestamp show they were served
/// from cache.
#[derive(Debug, Clone, Default)]
pub struct ClockOrigin {
    /// Simulated cost of producing a value
    latency: Duration,
}

impl ClockOrigin {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl OriginFetcher for ClockOrigin {
    async fn fetch(&self, key: &str) -> Result<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let value = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        debug!(key, %value, "clock origin produced value");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn test_returns_parseable_timestamp() {
        let value = ClockOrigin::default().fetch("any").await.unwrap();

        assert!(value.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&value).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_applies_latency() {
        let origin = ClockOrigin::new(Duration::from_millis(250));
        let started = tokio::time::Instant::now();

        origin.fetch("k").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
