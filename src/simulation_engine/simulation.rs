// simulation.rs
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::config::{ConfigError, SimulationConfig};
use crate::control_system::traffic_light_controller::{PhaseState, TrafficLightController};
use crate::shared_data::{current_timestamp, LaneStatus, SimulationSnapshot, VehicleStatus};
use crate::simulation_engine::gates::CapacityGate;
use crate::simulation_engine::lanes::{create_lanes, Lane};
use crate::simulation_engine::shutdown::ShutdownSignal;
use crate::simulation_engine::vehicles::{
    drive, queue_index, DriveTimings, Vehicle, VehicleRegistry, VehicleState,
};

/// Simulation root: owns the lanes, the two gates, the controller and the
/// live-vehicle registry, and wires the spawner and watchdog tasks.
///
/// Control surface: `start` launches the run, `request_stop` flips the
/// shutdown signal and returns immediately, `join` awaits the drain,
/// `snapshot` serves the (out-of-process-scope) rendering consumer.
pub struct Simulation {
    config: SimulationConfig,
    lanes: Vec<Arc<Lane>>,
    capacity: CapacityGate,
    registry: VehicleRegistry,
    controller: Arc<TrafficLightController>,
    shutdown: ShutdownSignal,
    spawned: Arc<AtomicUsize>,
    spawning_done: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let lanes = create_lanes(config.lanes_per_direction);
        let shutdown = ShutdownSignal::new();
        let controller = Arc::new(TrafficLightController::new(
            lanes.clone(),
            shutdown.clone(),
            &config,
        ));
        Ok(Self {
            capacity: CapacityGate::new(config.max_concurrent_in_intersection),
            lanes,
            registry: VehicleRegistry::new(),
            controller,
            shutdown,
            spawned: Arc::new(AtomicUsize::new(0)),
            spawning_done: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(Mutex::new(Vec::new())),
            config,
        })
    }

    /// Launches the controller, the spawner and the watchdog. Call once.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(
            Arc::clone(&self.controller).run_update_loop(),
        ));
        tasks.push(tokio::spawn(run_spawner(
            self.config.clone(),
            self.lanes.clone(),
            self.capacity.clone(),
            self.registry.clone(),
            self.shutdown.clone(),
            Arc::clone(&self.spawned),
            Arc::clone(&self.spawning_done),
            Arc::clone(&self.tasks),
        )));
        tasks.push(tokio::spawn(run_watchdog(
            self.config.simulation_time_limit,
            self.config.poll_interval,
            self.registry.clone(),
            self.shutdown.clone(),
            Arc::clone(&self.spawning_done),
        )));
        log::info!(
            "simulation started: {} lanes, capacity {}, population {}",
            self.lanes.len(),
            self.config.max_concurrent_in_intersection,
            self.config.vehicle_population
        );
    }

    /// Sets the shutdown flag and returns; the actual drain is asynchronous.
    pub fn request_stop(&self) {
        self.shutdown.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_stopped()
    }

    /// Awaits every task spawned so far, including vehicles the spawner
    /// added after `start`. A panicked vehicle task is logged and skipped;
    /// one agent's fault never blocks the drain.
    pub async fn join(&self) {
        loop {
            let handle = self.tasks.lock().unwrap().pop();
            match handle {
                Some(handle) => {
                    if let Err(err) = handle.await {
                        log::error!("simulation task failed: {err}");
                    }
                }
                None => break,
            }
        }
    }

    /// Read-only, eventually-consistent view for rendering and reporting.
    pub fn snapshot(&self) -> SimulationSnapshot {
        let live = self.registry.snapshot();
        let lanes = self
            .lanes
            .iter()
            .map(|lane| LaneStatus {
                name: lane.name.clone(),
                direction: lane.direction,
                passed: lane.passed_count(),
                waiting: live
                    .iter()
                    .filter(|v| {
                        Arc::ptr_eq(&v.lane, lane) && v.state() == VehicleState::WaitingInQueue
                    })
                    .count(),
            })
            .collect();
        let vehicles = live
            .iter()
            .map(|v| VehicleStatus {
                id: v.id,
                lane: v.lane.name.clone(),
                state: v.state(),
                queue_index: queue_index(&live, v),
            })
            .collect();
        SimulationSnapshot {
            timestamp: current_timestamp(),
            phase: self.controller.current_phase(),
            spawned: self.spawned.load(Ordering::SeqCst),
            live_vehicles: live.len(),
            lanes,
            vehicles,
        }
    }

    pub fn current_phase(&self) -> PhaseState {
        self.controller.current_phase()
    }

    pub fn lanes(&self) -> &[Arc<Lane>] {
        &self.lanes
    }

    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

/// Creates vehicles at random intervals until the population cap or a stop,
/// whichever comes first. Each vehicle runs as its own task; handles go into
/// the shared task list so `join` can drain them.
#[allow(clippy::too_many_arguments)]
async fn run_spawner(
    config: SimulationConfig,
    lanes: Vec<Arc<Lane>>,
    capacity: CapacityGate,
    registry: VehicleRegistry,
    shutdown: ShutdownSignal,
    spawned: Arc<AtomicUsize>,
    spawning_done: Arc<AtomicBool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    // SmallRng keeps the task Send; the seed makes runs reproducible.
    let seed = config.rng_seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = SmallRng::seed_from_u64(seed);
    log::debug!("spawner seed: {seed}");

    while spawned.load(Ordering::SeqCst) < config.vehicle_population {
        let wait = sample_duration(&mut rng, config.spawn_interval);
        if !shutdown
            .sleep_with_check(wait, config.poll_interval)
            .await
        {
            break;
        }

        let lane = Arc::clone(&lanes[rng.random_range(0..lanes.len())]);
        let id = spawned.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        let vehicle = Arc::new(Vehicle::new(id, lane));
        registry.insert(Arc::clone(&vehicle));
        log::info!("spawned vehicle {} on lane {}", id, vehicle.lane.name);

        let timings = DriveTimings {
            approach: sample_duration(&mut rng, config.approach_time),
            crossing: sample_duration(&mut rng, config.crossing_time),
            lane_retry: config.lane_retry_timeout,
            poll: config.poll_interval,
        };
        let handle = tokio::spawn(drive(
            vehicle,
            capacity.clone(),
            registry.clone(),
            shutdown.clone(),
            timings,
        ));
        tasks.lock().unwrap().push(handle);
    }

    spawning_done.store(true, Ordering::SeqCst);
    log::info!(
        "spawning finished: {} vehicles created",
        spawned.load(Ordering::SeqCst)
    );
}

/// Requests a stop when the wall-clock limit elapses, or earlier when the
/// spawner is done and the last vehicle has deregistered.
async fn run_watchdog(
    time_limit: Duration,
    poll: Duration,
    registry: VehicleRegistry,
    shutdown: ShutdownSignal,
    spawning_done: Arc<AtomicBool>,
) {
    let started = Instant::now();
    loop {
        if shutdown.is_stopped() {
            break;
        }
        if started.elapsed() >= time_limit {
            log::info!("simulation time limit reached");
            shutdown.request_stop();
            break;
        }
        if spawning_done.load(Ordering::SeqCst) && registry.is_empty() {
            log::info!("all vehicles have exited");
            shutdown.request_stop();
            break;
        }
        sleep(poll).await;
    }
}

fn sample_duration(rng: &mut SmallRng, (min, max): (Duration, Duration)) -> Duration {
    if min == max {
        return min;
    }
    Duration::from_millis(rng.random_range(min.as_millis() as u64..=max.as_millis() as u64))
}
