use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::simulation_engine::gates::CapacityGate;
use crate::simulation_engine::lanes::Lane;
use crate::simulation_engine::shutdown::ShutdownSignal;

/// Lifecycle of one vehicle. Transitions are strictly forward; `Exited` is
/// terminal. A backward transition is a programming defect and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleState {
    Approaching,
    WaitingInQueue,
    TryingToEnter,
    InIntersection,
    Exited,
}

impl VehicleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => VehicleState::Approaching,
            1 => VehicleState::WaitingInQueue,
            2 => VehicleState::TryingToEnter,
            3 => VehicleState::InIntersection,
            4 => VehicleState::Exited,
            _ => unreachable!("invalid vehicle state {raw}"),
        }
    }
}

/// One simulated vehicle. The driving task is the only writer of `state`;
/// snapshot readers poll it without locking and tolerate being one
/// transition behind.
#[derive(Debug)]
pub struct Vehicle {
    pub id: u64,
    pub lane: Arc<Lane>,
    state: AtomicU8,
}

impl Vehicle {
    pub fn new(id: u64, lane: Arc<Lane>) -> Self {
        Self {
            id,
            lane,
            state: AtomicU8::new(VehicleState::Approaching as u8),
        }
    }

    pub fn state(&self) -> VehicleState {
        VehicleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, next: VehicleState) {
        let prev = VehicleState::from_u8(self.state.swap(next as u8, Ordering::SeqCst));
        assert!(
            prev < next,
            "vehicle {} state went backward: {:?} -> {:?}",
            self.id,
            prev,
            next
        );
        log::debug!("vehicle {} ({}) -> {:?}", self.id, self.lane.name, next);
    }
}

/// Live-vehicle collection shared between the core and snapshot readers.
/// Insertion order is creation order, which the display queue index relies
/// on. The mutex only guards the container operation itself, never a gate
/// wait.
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    inner: Arc<Mutex<Vec<Arc<Vehicle>>>>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vehicle: Arc<Vehicle>) {
        self.inner.lock().unwrap().push(vehicle);
    }

    pub fn remove(&self, id: u64) {
        self.inner.lock().unwrap().retain(|v| v.id != id);
    }

    /// Clones out the current live set for iteration.
    pub fn snapshot(&self) -> Vec<Arc<Vehicle>> {
        self.inner.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Position of `vehicle` in its lane's visible queue: how many same-lane
/// vehicles created earlier are also waiting. Display-only; admission order
/// is whatever order the lane gate wakes waiters in.
pub fn queue_index(live: &[Arc<Vehicle>], vehicle: &Vehicle) -> usize {
    live.iter()
        .filter(|v| {
            v.id < vehicle.id
                && Arc::ptr_eq(&v.lane, &vehicle.lane)
                && v.state() == VehicleState::WaitingInQueue
        })
        .count()
}

/// Per-vehicle timing picked by the spawner.
#[derive(Debug, Clone, Copy)]
pub struct DriveTimings {
    /// Travel time from spawn point to the stop line.
    pub approach: Duration,
    /// Dwell time inside the crossing.
    pub crossing: Duration,
    /// Bound on each lane-gate acquire attempt.
    pub lane_retry: Duration,
    /// Shutdown poll granularity for the approach sleep.
    pub poll: Duration,
}

/// The admission protocol, one task per vehicle.
///
/// Approach, queue on the lane gate with a bounded retry so the task stays
/// cancellable and observable, then enter the crossing under the capacity
/// gate and leave. A vehicle that observed shutdown before earning its lane
/// permit abandons without crossing; a vehicle already past the lane gate
/// finishes the crossing, shutdown or not, and always releases its capacity
/// slot (RAII permit).
pub async fn drive(
    vehicle: Arc<Vehicle>,
    capacity: CapacityGate,
    registry: VehicleRegistry,
    shutdown: ShutdownSignal,
    timings: DriveTimings,
) {
    if !shutdown
        .sleep_with_check(timings.approach, timings.poll)
        .await
    {
        registry.remove(vehicle.id);
        return;
    }

    vehicle.set_state(VehicleState::WaitingInQueue);
    loop {
        if shutdown.is_stopped() {
            log::debug!(
                "vehicle {} abandoning queue on {} (shutdown)",
                vehicle.id,
                vehicle.lane.name
            );
            registry.remove(vehicle.id);
            return;
        }
        if vehicle.lane.gate.try_acquire(timings.lane_retry).await {
            break;
        }
    }

    // Lane permit earned; the wait for a crossing slot may block unbounded.
    vehicle.set_state(VehicleState::TryingToEnter);
    let permit = capacity.enter().await;

    vehicle.set_state(VehicleState::InIntersection);
    let passed = vehicle.lane.record_passed();
    log::info!(
        "vehicle {} crossing from {} (lane total {})",
        vehicle.id,
        vehicle.lane.name,
        passed
    );

    // Never aborted mid-crossing, even during shutdown. The state flips to
    // Exited before the permit drops so occupancy readers never see more
    // than `bound` vehicles inside.
    sleep(timings.crossing).await;
    vehicle.set_state(VehicleState::Exited);
    drop(permit);
    log::info!("vehicle {} exited via {}", vehicle.id, vehicle.lane.name);
    registry.remove(vehicle.id);
}
