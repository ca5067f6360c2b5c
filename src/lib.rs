//! In-process simulation of a signalized road intersection, modeled as a
//! concurrency problem: the crossing is a bounded critical section
//! ([`CapacityGate`](simulation_engine::gates::CapacityGate)), each lane has
//! a finite-throughput green window
//! ([`LaneGate`](simulation_engine::gates::LaneGate)), a cyclic controller
//! alternates green/yellow per direction, and every vehicle is an
//! independent tokio task walking a forward-only admission protocol. All
//! coordination goes through counting permits and bounded polling; there is
//! no global lock and shutdown is cooperative everywhere.
//!
//! Entry point is [`Simulation`]: build it from a
//! [`SimulationConfig`], call `start`, observe it through `snapshot`,
//! and stop it with `request_stop` (or let the watchdog do it).

pub mod config;
pub mod control_system;
pub mod shared_data;
pub mod simulation_engine;

pub use config::{ConfigError, SimulationConfig};
pub use simulation_engine::simulation::Simulation;
