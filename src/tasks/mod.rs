//! Background Tasks Module
//!
//! # Tasks
//! - Expiry sweep: drops stale entries that no request has touched

mod cleanup;

pub use cleanup::spawn_cleanup_task;
