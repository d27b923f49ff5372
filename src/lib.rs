//! Edge Cache - a read-through caching layer in front of an origin
//!
//! Serves cached responses with TTL freshness and coalesces concurrent
//! misses for the same key into one origin fetch.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod origin;
pub mod tasks;

pub use api::{AppState, RequestHandler};
pub use cache::CacheStore;
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_cleanup_task;
