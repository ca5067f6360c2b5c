use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::simulation_engine::gates::LaneGate;

/// Traffic-flow groups sharing a green phase. At most one direction is open
/// at any instant; during the all-red transition neither is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    NorthSouth,
    EastWest,
}

impl Direction {
    /// Cycle order for the phase controller.
    pub const ALL: [Direction; 2] = [Direction::NorthSouth, Direction::EastWest];

    fn prefix(self) -> &'static str {
        match self {
            Direction::NorthSouth => "NS",
            Direction::EastWest => "EW",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One approach lane: identity, its admission gate and a monotonically
/// increasing count of vehicles that entered the crossing from it. Lanes are
/// created once at startup and live for the whole run.
#[derive(Debug)]
pub struct Lane {
    pub name: String,
    pub direction: Direction,
    pub gate: LaneGate,
    passed: AtomicU64,
}

impl Lane {
    pub fn new(name: String, direction: Direction) -> Self {
        Self {
            name,
            direction,
            gate: LaneGate::new(),
            passed: AtomicU64::new(0),
        }
    }

    /// Bumps the passed-count. Called exactly once per vehicle, at the
    /// moment it enters the crossing.
    pub fn record_passed(&self) -> u64 {
        self.passed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn passed_count(&self) -> u64 {
        self.passed.load(Ordering::SeqCst)
    }
}

/// Builds the startup lane set: `NS-1..NS-n` then `EW-1..EW-n`.
pub fn create_lanes(lanes_per_direction: usize) -> Vec<Arc<Lane>> {
    let mut lanes = Vec::with_capacity(lanes_per_direction * Direction::ALL.len());
    for direction in Direction::ALL {
        for i in 1..=lanes_per_direction {
            lanes.push(Arc::new(Lane::new(
                format!("{}-{}", direction.prefix(), i),
                direction,
            )));
        }
    }
    lanes
}
