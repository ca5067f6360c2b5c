// src/shared_data.rs

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::control_system::traffic_light_controller::PhaseState;
use crate::simulation_engine::lanes::Direction;
use crate::simulation_engine::vehicles::VehicleState;

/// Per-lane view for the rendering/reporting consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneStatus {
    pub name: String,
    pub direction: Direction,
    /// Vehicles that have entered the crossing from this lane so far.
    pub passed: u64,
    /// Vehicles currently queued at this lane's stop line.
    pub waiting: usize,
}

/// Per-vehicle view for the rendering/reporting consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub id: u64,
    pub lane: String,
    pub state: VehicleState,
    /// Visible queue slot (0 = front). Cosmetic; not an admission order.
    pub queue_index: usize,
}

/// Read-only, eventually-consistent picture of the whole run. Produced on
/// demand by `Simulation::snapshot`; never feeds back into the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub timestamp: u64,
    pub phase: PhaseState,
    pub spawned: usize,
    pub live_vehicles: usize,
    pub lanes: Vec<LaneStatus>,
    pub vehicles: Vec<VehicleStatus>,
}

/// Current unix time in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
