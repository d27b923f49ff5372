//! Error types for the edge cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the edge cache.
///
/// `Clone` so a single failed origin fetch can be handed to every waiter
/// coalesced on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Inbound request could not be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Key not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Origin answered with a failure
    #[error("Origin error: {0}")]
    OriginError(String),

    /// Origin could not be reached
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),

    /// Fetch or wait exceeded the configured bound
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Store is at its hard capacity and nothing can be evicted
    #[error("Cache capacity of {0} entries exceeded")]
    CapacityExceeded(usize),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::OriginError(_) => StatusCode::BAD_GATEWAY,
            CacheError::OriginUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to clients. Origin and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            CacheError::MalformedRequest(_) | CacheError::NotFound(_) => self.to_string(),
            CacheError::OriginError(_) => "Origin request failed".to_string(),
            CacheError::OriginUnavailable(_) => "Origin unavailable".to_string(),
            CacheError::Timeout(_) => "Origin request timed out".to_string(),
            CacheError::CapacityExceeded(_) => "Cache is temporarily full".to_string(),
            CacheError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.public_message()
        }));

        (
            self.status_code(),
            [(header::CACHE_CONTROL, "no-store")],
            body,
        )
            .into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the edge cache.
pub type Result<T> = std::result::Result<T, CacheError>;
