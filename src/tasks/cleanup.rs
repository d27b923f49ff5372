//! Expiry Sweep Task
//!
//! Stale entries are already treated as absent on lookup. The sweep only
//! reclaims memory held by keys nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a task that removes expired entries every `interval_secs` seconds.
///
/// The returned handle is aborted during graceful shutdown. An interval of
/// zero is treated as one second.
pub fn spawn_cleanup_task(cache: Arc<CacheStore>, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "starting expiry sweep task");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!(removed, "expiry sweep removed stale entries");
            } else {
                debug!("expiry sweep found no stale entries");
            }
        }
    })
}
