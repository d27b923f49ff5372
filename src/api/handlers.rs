//! API Handlers
//!
//! The request handler that turns a query into a cached response, plus the
//! axum handlers for each endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{CacheQuery, CacheResponse, HealthResponse, InvalidateResponse, StatsResponse};
use crate::origin::OriginFetcher;

/// Default freshness window
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Key used for requests that carry none
pub const DEFAULT_KEY: &str = "default";

/// Response header reporting HIT or MISS
const X_CACHE: &str = "x-cache";

// == Cache Reply ==
/// Result of handling one request: the body and how long it may be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReply {
    pub body: CacheResponse,
    /// Seconds downstream intermediaries may reuse the response
    pub max_age: u64,
}

impl IntoResponse for CacheReply {
    fn into_response(self) -> Response {
        let cache_control = HeaderValue::from_str(&format!("public, max-age={}", self.max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("no-store"));
        let x_cache = HeaderValue::from_static(if self.body.cached { "HIT" } else { "MISS" });

        (
            [(header::CACHE_CONTROL, cache_control), (HeaderName::from_static(X_CACHE), x_cache)],
            Json(self.body),
        )
            .into_response()
    }
}

// == Request Handler ==
/// Derives a cache key from each request and serves it read-through.
pub struct RequestHandler {
    cache: Arc<CacheStore>,
    origin: Arc<dyn OriginFetcher>,
    ttl: Duration,
    default_key: String,
}

impl RequestHandler {
    pub fn new(cache: Arc<CacheStore>, origin: Arc<dyn OriginFetcher>) -> Self {
        Self {
            cache,
            origin,
            ttl: DEFAULT_TTL,
            default_key: DEFAULT_KEY.to_string(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_default_key(mut self, default_key: impl Into<String>) -> Self {
        self.default_key = default_key.into();
        self
    }

    /// Serves one request.
    ///
    /// Origin failures come back as errors and are never cached.
    pub async fn handle(&self, query: &CacheQuery) -> Result<CacheReply> {
        let key = query.cache_key(&self.default_key)?;

        let lookup = self
            .cache
            .get_or_fetch(key, self.ttl, || self.origin.fetch(key))
            .await?;
        debug!(key, outcome = ?lookup.outcome, "served cache request");

        let max_age = lookup.entry.ttl_remaining_secs().min(self.ttl.as_secs());
        let cached = lookup.is_cached();
        Ok(CacheReply {
            body: CacheResponse {
                result: lookup.entry.value,
                cached,
            },
            max_age,
        })
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub handler: Arc<RequestHandler>,
}

impl AppState {
    /// Creates state around one store and one origin with default TTL and key.
    pub fn new(cache: CacheStore, origin: Arc<dyn OriginFetcher>) -> Self {
        let cache = Arc::new(cache);
        let handler = RequestHandler::new(cache.clone(), origin);
        Self::with_handler(cache, handler)
    }

    pub fn with_handler(cache: Arc<CacheStore>, handler: RequestHandler) -> Self {
        Self {
            cache,
            handler: Arc::new(handler),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config, origin: Arc<dyn OriginFetcher>) -> Self {
        let cache = Arc::new(
            CacheStore::new(config.max_entries, config.fetch_timeout())
                .with_eviction_policy(config.eviction_policy),
        );
        let handler = RequestHandler::new(cache.clone(), origin)
            .with_ttl(config.ttl())
            .with_default_key(config.default_key.clone());
        Self::with_handler(cache, handler)
    }
}

/// Handler for GET /cache?key=...
pub async fn cache_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<CacheQuery>, QueryRejection>,
) -> Result<CacheReply> {
    let Query(query) =
        query.map_err(|rejection| CacheError::MalformedRequest(rejection.body_text()))?;
    state.handler.handle(&query).await
}

/// Handler for DELETE /cache/:key
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    if state.cache.invalidate(&key) {
        Ok(Json(InvalidateResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Origin answering `<key>#<call number>`, optionally failing.
    #[derive(Default)]
    struct CountingOrigin {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OriginFetcher for CountingOrigin {
        async fn fetch(&self, key: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(CacheError::OriginUnavailable("connection refused".into()));
            }
            Ok(format!("{key}#{n}"))
        }
    }

    fn handler(origin: Arc<CountingOrigin>) -> RequestHandler {
        RequestHandler::new(Arc::new(CacheStore::new(100, Duration::from_secs(5))), origin)
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit_within_ttl() {
        let origin = Arc::new(CountingOrigin::default());
        let handler = handler(origin.clone());

        let first = handler.handle(&CacheQuery::new("A")).await.unwrap();
        assert_eq!(first.body.result, "A#1");
        assert!(!first.body.cached);
        assert_eq!(first.max_age, 60);

        tokio::time::advance(Duration::from_secs(15)).await;

        let second = handler.handle(&CacheQuery::new("A")).await.unwrap();
        assert_eq!(second.body.result, "A#1");
        assert!(second.body.cached);
        assert_eq!(second.max_age, 45);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_ttl() {
        let origin = Arc::new(CountingOrigin::default());
        let handler = handler(origin.clone()).with_ttl(Duration::from_secs(10));

        handler.handle(&CacheQuery::new("A")).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let reply = handler.handle(&CacheQuery::new("A")).await.unwrap();
        assert_eq!(reply.body.result, "A#2");
        assert!(!reply.body.cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_shares_default_entry() {
        let origin = Arc::new(CountingOrigin::default());
        let handler = handler(origin.clone());

        let implicit = handler.handle(&CacheQuery::default()).await.unwrap();
        let explicit = handler.handle(&CacheQuery::new(DEFAULT_KEY)).await.unwrap();
        let empty = handler.handle(&CacheQuery::new("")).await.unwrap();

        assert_eq!(implicit.body.result, "default#1");
        assert_eq!(explicit.body.result, "default#1");
        assert!(explicit.body.cached);
        assert!(empty.body.cached);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_origin_failure_not_cached() {
        let origin = Arc::new(CountingOrigin {
            fail: true,
            ..Default::default()
        });
        let handler = handler(origin.clone());

        for _ in 0..2 {
            let err = handler.handle(&CacheQuery::new("A")).await.unwrap_err();
            assert!(matches!(err, CacheError::OriginUnavailable(_)));
        }
        assert_eq!(origin.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oversized_key_rejected_without_fetch() {
        let origin = Arc::new(CountingOrigin::default());
        let handler = handler(origin.clone());

        let err = handler
            .handle(&CacheQuery::new("k".repeat(1000)))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::MalformedRequest(_)));
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reply_headers() {
        let reply = CacheReply {
            body: CacheResponse {
                result: "R".into(),
                cached: true,
            },
            max_age: 42,
        };

        let response = reply.into_response();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=42");
        assert_eq!(response.headers()["x-cache"], "HIT");
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let origin = Arc::new(CountingOrigin::default());
        let state = AppState::new(CacheStore::new(100, Duration::from_secs(5)), origin);
        state.handler.handle(&CacheQuery::new("A")).await.unwrap();

        let result = invalidate_handler(State(state.clone()), Path("A".to_string())).await;
        assert!(result.is_ok());

        let result = invalidate_handler(State(state), Path("A".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
