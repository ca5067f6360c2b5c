// simulation_engine/mod.rs
pub mod gates;
pub mod lanes;
pub mod shutdown;
pub mod simulation;
pub mod vehicles;
