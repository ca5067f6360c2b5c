use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

/// Cooperative stop flag shared by the controller, the spawner and every
/// vehicle task. The flag only ever transitions running -> stopped; nothing
/// is forcibly terminated, each task observes the flag at its next
/// suspension point and returns on its own.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flips the flag to stopped. Returns immediately; draining is
    /// asynchronous. Safe to call more than once, only the first call logs.
    pub fn request_stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("shutdown requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Sleeps for `total`, re-checking the flag every `poll` so worst-case
    /// shutdown latency is bounded by the poll granularity. Returns true if
    /// the full duration elapsed, false if a stop was observed first.
    pub async fn sleep_with_check(&self, total: Duration, poll: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_stopped() {
                return false;
            }
            let slice = remaining.min(poll);
            sleep(slice).await;
            remaining -= slice;
        }
        !self.is_stopped()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_observed_by_clones() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_stopped());
        signal.request_stop();
        assert!(other.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_stopped() {
        let signal = ShutdownSignal::new();
        let done = signal
            .sleep_with_check(Duration::from_millis(500), Duration::from_millis(100))
            .await;
        assert!(done);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_aborts_within_one_poll_interval() {
        let signal = ShutdownSignal::new();
        let watcher = signal.clone();
        let handle = tokio::spawn(async move {
            watcher
                .sleep_with_check(Duration::from_secs(60), Duration::from_millis(100))
                .await
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
        signal.request_stop();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.is_finished());
        assert!(!handle.await.unwrap());
    }
}
