use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

/// Bounds how many vehicles occupy the crossing at once.
///
/// `enter` hands out an RAII permit, so the capacity is returned on every
/// exit path including task unwinding. The underlying tokio semaphore wakes
/// waiters in FIFO order, which gives the eventual-fairness guarantee the
/// protocol relies on (no vehicle waits forever while permits keep going to
/// others).
#[derive(Debug, Clone)]
pub struct CapacityGate {
    permits: Arc<Semaphore>,
    bound: usize,
}

/// Occupancy of one slot in the crossing. Dropping it frees the slot.
pub struct IntersectionPermit {
    _permit: OwnedSemaphorePermit,
}

impl CapacityGate {
    pub fn new(bound: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(bound)),
            bound,
        }
    }

    /// Blocks until a slot is free. Unbounded by design: callers already
    /// hold a scarce lane permit, so backpressure was applied upstream.
    pub async fn enter(&self) -> IntersectionPermit {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("capacity gate semaphore closed");
        IntersectionPermit { _permit: permit }
    }

    /// Bounded variant of `enter`; `None` on timeout.
    pub async fn try_enter(&self, wait: Duration) -> Option<IntersectionPermit> {
        match timeout(wait, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => Some(IntersectionPermit { _permit: permit }),
            Ok(Err(_)) => panic!("capacity gate semaphore closed"),
            Err(_) => None,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Slots not currently occupied.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Per-lane admission window. Starts closed (zero permits); the controller
/// opens it with a fixed permit count at green and drains whatever is left
/// at the end of yellow, so no permit survives into the next cycle.
#[derive(Debug)]
pub struct LaneGate {
    permits: Semaphore,
}

impl LaneGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
        }
    }

    /// Adds the green-window budget. Called once per green phase per lane.
    pub fn open_window(&self, permit_count: usize) {
        self.permits.add_permits(permit_count);
    }

    /// Atomically discards all unacquired permits and returns how many were
    /// discarded. A late waiter can no longer consume a stale permit once
    /// this returns; waiters already woken keep theirs (yellow-light rule).
    pub fn close_window(&self) -> usize {
        self.permits.forget_permits(Semaphore::MAX_PERMITS)
    }

    /// Consumes one permit, waiting up to `wait` for one to appear.
    /// Acquired permits are spent, never returned to the gate.
    pub async fn try_acquire(&self, wait: Duration) -> bool {
        match timeout(wait, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            Ok(Err(_)) => panic!("lane gate semaphore closed"),
            Err(_) => false,
        }
    }

    /// Permits currently up for grabs (zero whenever the window is closed).
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for LaneGate {
    fn default() -> Self {
        Self::new()
    }
}
