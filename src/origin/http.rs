//! HTTP origin: forwards misses to an upstream service.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::OriginFetcher;
use crate::error::{CacheError, Result};

/// Origin that issues `GET {base_url}?key={key}` and caches the body text.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    /// Builds a client for `base_url`, giving up on connects after `connect_timeout`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build origin client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl OriginFetcher for HttpOrigin {
    async fn fetch(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| CacheError::OriginUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::OriginError(format!(
                "{} answered {status}",
                self.base_url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CacheError::OriginError(format!("failed to read origin body: {e}")))?;
        debug!(key, bytes = body.len(), "http origin fetched value");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Router};
    use std::collections::HashMap;

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/value",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    format!("upstream:{}", params.get("key").cloned().unwrap_or_default())
                }),
            )
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_forwards_key() {
        let base = spawn_upstream().await;
        let origin = HttpOrigin::new(format!("{base}/value"), Duration::from_secs(1)).unwrap();

        assert_eq!(origin.fetch("A").await.unwrap(), "upstream:A");
    }

    #[tokio::test]
    async fn test_non_success_status_is_origin_error() {
        let base = spawn_upstream().await;
        let origin = HttpOrigin::new(format!("{base}/broken"), Duration::from_secs(1)).unwrap();

        let err = origin.fetch("A").await.unwrap_err();
        assert!(matches!(err, CacheError::OriginError(_)));
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_unavailable() {
        // Grab a free port, then close it so nothing listens there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let origin = HttpOrigin::new(format!("http://{addr}/value"), Duration::from_secs(1)).unwrap();
        let err = origin.fetch("A").await.unwrap_err();
        assert!(matches!(err, CacheError::OriginUnavailable(_)));
    }
}
