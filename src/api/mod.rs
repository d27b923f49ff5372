//! API Module
//!
//! HTTP front-end of the edge cache.
//!
//! # Endpoints
//! - `GET /cache?key=...` - Read-through lookup
//! - `DELETE /cache/:key` - Invalidate a cached key
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
