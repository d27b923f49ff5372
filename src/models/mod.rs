//! Request and Response models for the edge cache API
//!
//! DTOs used for decoding query strings and serializing response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::CacheQuery;
pub use responses::{CacheResponse, HealthResponse, InvalidateResponse, StatsResponse};
