use std::time::Duration;

use thiserror::Error;

/// Tunables for one simulation run. Every field has a default matching the
/// reference intersection (two lanes per direction, at most two vehicles in
/// the crossing, four permits per green window).
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Lanes created per traffic direction at startup.
    pub lanes_per_direction: usize,
    /// Capacity gate bound: vehicles allowed inside the crossing at once.
    pub max_concurrent_in_intersection: usize,
    /// Permits added to each lane gate at the start of its green window.
    pub permits_per_green: usize,
    pub green_duration: Duration,
    pub yellow_duration: Duration,
    /// Total number of vehicles the spawner will create.
    pub vehicle_population: usize,
    /// Random delay between consecutive spawns (min, max).
    pub spawn_interval: (Duration, Duration),
    /// Wall-clock limit after which the watchdog requests a stop.
    pub simulation_time_limit: Duration,
    /// Granularity at which timed sleeps re-check the shutdown signal.
    pub poll_interval: Duration,
    /// How long a queued vehicle waits on its lane gate per attempt.
    pub lane_retry_timeout: Duration,
    /// Random travel time from spawn point to the stop line (min, max).
    pub approach_time: (Duration, Duration),
    /// Random dwell time inside the crossing (min, max).
    pub crossing_time: (Duration, Duration),
    /// Fixed seed for reproducible runs; `None` seeds from the thread RNG.
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            lanes_per_direction: 2,
            max_concurrent_in_intersection: 2,
            permits_per_green: 4,
            green_duration: Duration::from_millis(4000),
            yellow_duration: Duration::from_millis(1200),
            vehicle_population: 10,
            spawn_interval: (Duration::from_millis(150), Duration::from_millis(750)),
            simulation_time_limit: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            lane_retry_timeout: Duration::from_millis(200),
            approach_time: (Duration::from_millis(200), Duration::from_millis(1400)),
            crossing_time: (Duration::from_millis(900), Duration::from_millis(1500)),
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Checks the config for values that would deadlock or trivialize the
    /// run. Called by `Simulation::new` before anything is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes_per_direction == 0 {
            return Err(ConfigError::NoLanes);
        }
        if self.max_concurrent_in_intersection == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.permits_per_green == 0 {
            return Err(ConfigError::ZeroPermitsPerGreen);
        }
        if self.poll_interval.is_zero() || self.lane_retry_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        for (name, range) in [
            ("spawn_interval", &self.spawn_interval),
            ("approach_time", &self.approach_time),
            ("crossing_time", &self.crossing_time),
        ] {
            if range.0 > range.1 {
                return Err(ConfigError::InvertedRange { field: name });
            }
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lanes_per_direction must be at least 1")]
    NoLanes,
    #[error("max_concurrent_in_intersection must be at least 1")]
    ZeroCapacity,
    #[error("permits_per_green must be at least 1")]
    ZeroPermitsPerGreen,
    #[error("poll_interval and lane_retry_timeout must be non-zero")]
    ZeroInterval,
    #[error("{field} range has min > max")]
    InvertedRange { field: &'static str },
}
