//! Response DTOs for the edge cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for `GET /cache`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheResponse {
    /// Value produced by the origin
    pub result: String,
    /// False only for the request that went to the origin
    pub cached: bool,
}

/// Response body for `DELETE /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub key: String,
}

impl InvalidateResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' invalidated", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Share of lookups that did not go to the origin
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_response_shape() {
        let resp = CacheResponse {
            result: "R".to_string(),
            cached: false,
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "result": "R", "cached": false })
        );
    }

    #[test]
    fn test_stats_response_flattens_counters() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();

        let value = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert_eq!(value["hits"], 1);
        assert_eq!(value["misses"], 1);
        assert_eq!(value["hit_rate"], 0.5);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
