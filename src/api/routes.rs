//! API Routes
//!
//! Configures the Axum router with all edge cache endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_handler, health_handler, invalidate_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache", get(cache_handler))
        .route("/cache/:key", delete(invalidate_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::origin::ClockOrigin;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let cache = CacheStore::new(100, Duration::from_secs(5));
        let state = AppState::new(cache, Arc::new(ClockOrigin::default()));
        create_router(state)
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_endpoint() {
        assert_eq!(
            status_of(create_test_app(), "GET", "/cache?key=A").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_invalidate_not_found() {
        assert_eq!(
            status_of(create_test_app(), "DELETE", "/cache/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        assert_eq!(
            status_of(create_test_app(), "POST", "/cache").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
