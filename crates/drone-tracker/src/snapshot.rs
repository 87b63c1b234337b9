//! Pending snapshot flag
//!
//! The operator raises the flag and waits; the tracking loop saves the next
//! encoded frame and clears it. The wait is bounded so a stalled video feed
//! never blocks the request forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time;
use tracing::warn;

/// Default bound on a snapshot wait
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
pub struct SnapshotRequest {
    pending: Arc<AtomicBool>,
    cleared: Arc<Notify>,
}

impl SnapshotRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }

    /// Raise the flag and wait until it is cleared or `timeout` passes
    ///
    /// Returns `true` if a frame was captured. On timeout the flag is cleared
    /// here so no stale request lingers.
    pub async fn request(&self, timeout: Duration) -> bool {
        let cleared = self.cleared.notified();
        tokio::pin!(cleared);
        cleared.as_mut().enable();

        self.pending.store(true, Ordering::Relaxed);

        if time::timeout(timeout, cleared).await.is_ok() {
            return true;
        }

        warn!("Snapshot not captured within {:?}", timeout);
        self.pending.store(false, Ordering::Relaxed);
        false
    }

    /// Clear the flag and wake every waiter
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Relaxed);
        self.cleared.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cleared_by_capture() {
        let snapshot = SnapshotRequest::new();

        let capturer = {
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                while !snapshot.is_pending() {
                    time::sleep(Duration::from_millis(10)).await;
                }
                time::sleep(Duration::from_millis(500)).await;
                snapshot.clear();
            })
        };

        let started = time::Instant::now();
        assert!(snapshot.request(DEFAULT_SNAPSHOT_TIMEOUT).await);
        assert!(started.elapsed() < DEFAULT_SNAPSHOT_TIMEOUT);
        assert!(!snapshot.is_pending());
        capturer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_cleared_on_timeout() {
        let snapshot = SnapshotRequest::new();

        let started = time::Instant::now();
        assert!(!snapshot.request(DEFAULT_SNAPSHOT_TIMEOUT).await);
        assert!(started.elapsed() >= DEFAULT_SNAPSHOT_TIMEOUT);
        assert!(!snapshot.is_pending());
    }

    #[test]
    fn test_clear_without_waiters() {
        let snapshot = SnapshotRequest::new();
        snapshot.clear();
        assert!(!snapshot.is_pending());
    }
}
