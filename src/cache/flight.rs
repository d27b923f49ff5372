//! In-flight Fetch Module
//!
//! Bookkeeping for a Pending key: the channel the leader resolves and
//! waiters subscribe to.

use std::time::Duration;

use tokio::sync::watch;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Value published by the leader. `None` until the fetch resolves.
pub(crate) type FlightOutcome = Option<Result<CacheEntry>>;

// == Flight ==
/// Waiter side of one in-flight origin fetch.
#[derive(Debug)]
pub(crate) struct Flight {
    /// Distinguishes successive fetches for the same key
    pub id: u64,
    rx: watch::Receiver<FlightOutcome>,
}

impl Flight {
    /// Opens a flight, returning the waiter side and the leader's sender.
    pub fn open(id: u64) -> (Self, watch::Sender<FlightOutcome>) {
        let (tx, rx) = watch::channel(None);
        (Self { id, rx }, tx)
    }

    pub fn subscribe(&self) -> watch::Receiver<FlightOutcome> {
        self.rx.clone()
    }
}

// == Wait ==
/// Waits for the leader to resolve a flight.
///
/// Returns `Ok(None)` if the leader went away without publishing a result,
/// which happens when the leader's future is dropped.
pub(crate) async fn wait(
    mut rx: watch::Receiver<FlightOutcome>,
    timeout: Duration,
) -> Result<Option<CacheEntry>> {
    let waited = tokio::time::timeout(timeout, async {
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        }
    })
    .await;

    match waited {
        Err(_) => Err(CacheError::Timeout(millis(timeout))),
        Ok(None) => Ok(None),
        Ok(Some(Ok(entry))) => Ok(Some(entry)),
        Ok(Some(Err(err))) => Err(err),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_receives_published_entry() {
        let (flight, tx) = Flight::open(1);
        let rx = flight.subscribe();

        let entry = CacheEntry::new("v".to_string(), Duration::from_secs(5));
        tx.send_replace(Some(Ok(entry.clone())));

        let got = wait(rx, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, Some(entry));
    }

    #[tokio::test]
    async fn test_wait_receives_error() {
        let (flight, tx) = Flight::open(1);
        let rx = flight.subscribe();

        tx.send_replace(Some(Err(CacheError::OriginError("boom".into()))));

        let got = wait(rx, Duration::from_secs(1)).await;
        assert_eq!(got, Err(CacheError::OriginError("boom".into())));
    }

    #[tokio::test]
    async fn test_wait_sees_abandoned_leader() {
        let (flight, tx) = Flight::open(1);
        let rx = flight.subscribe();
        drop(tx);

        assert_eq!(wait(rx, Duration::from_secs(1)).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let (flight, _tx) = Flight::open(1);

        let got = wait(flight.subscribe(), Duration::from_millis(200)).await;
        assert_eq!(got, Err(CacheError::Timeout(200)));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
