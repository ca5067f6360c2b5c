use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use intersection_sim::control_system::traffic_light_controller::TrafficLightController;
use intersection_sim::simulation_engine::gates::CapacityGate;
use intersection_sim::simulation_engine::lanes::{create_lanes, Direction};
use intersection_sim::simulation_engine::shutdown::ShutdownSignal;
use intersection_sim::simulation_engine::vehicles::{
    drive, DriveTimings, Vehicle, VehicleRegistry, VehicleState,
};
use intersection_sim::{Simulation, SimulationConfig};

fn fast_config() -> SimulationConfig {
    SimulationConfig {
        green_duration: Duration::from_millis(600),
        yellow_duration: Duration::from_millis(150),
        spawn_interval: (Duration::from_millis(20), Duration::from_millis(60)),
        approach_time: (Duration::from_millis(10), Duration::from_millis(30)),
        crossing_time: (Duration::from_millis(40), Duration::from_millis(80)),
        lane_retry_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(20),
        rng_seed: Some(42),
        ..SimulationConfig::default()
    }
}

/// Six vehicles on one lane, capacity 2, four permits per green: never more
/// than two in the crossing at once, all six cross, the lane counts six.
#[tokio::test(start_paused = true)]
async fn single_lane_capacity_two_admits_all_six() {
    let config = SimulationConfig {
        lanes_per_direction: 1,
        max_concurrent_in_intersection: 2,
        permits_per_green: 4,
        green_duration: Duration::from_millis(3000),
        yellow_duration: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        ..SimulationConfig::default()
    };
    let lanes = create_lanes(config.lanes_per_direction);
    let ns_lane = Arc::clone(&lanes[0]);
    let capacity = CapacityGate::new(config.max_concurrent_in_intersection);
    let registry = VehicleRegistry::new();
    let shutdown = ShutdownSignal::new();
    let controller = Arc::new(TrafficLightController::new(
        lanes.clone(),
        shutdown.clone(),
        &config,
    ));
    let controller_handle = tokio::spawn(Arc::clone(&controller).run_update_loop());

    let mut vehicles = Vec::new();
    for id in 1..=6 {
        let vehicle = Arc::new(Vehicle::new(id, Arc::clone(&ns_lane)));
        registry.insert(Arc::clone(&vehicle));
        vehicles.push(tokio::spawn(drive(
            vehicle,
            capacity.clone(),
            registry.clone(),
            shutdown.clone(),
            DriveTimings {
                approach: Duration::from_millis(10),
                crossing: Duration::from_millis(100),
                lane_retry: Duration::from_millis(200),
                poll: Duration::from_millis(50),
            },
        )));
    }

    // Sample occupancy until the last vehicle deregisters.
    let sampler = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut max_inside = 0;
            while !registry.is_empty() {
                let inside = registry
                    .snapshot()
                    .iter()
                    .filter(|v| v.state() == VehicleState::InIntersection)
                    .count();
                max_inside = max_inside.max(inside);
                sleep(Duration::from_millis(10)).await;
            }
            max_inside
        })
    };

    for handle in vehicles {
        handle.await.unwrap();
    }
    let max_inside = sampler.await.unwrap();

    assert!(max_inside <= 2, "occupancy exceeded bound: {max_inside}");
    assert_eq!(ns_lane.passed_count(), 6);
    assert!(registry.is_empty());

    shutdown.request_stop();
    controller_handle.await.unwrap();
}

/// Stop requested before the first phase ever opens: nothing spawns, nothing
/// crosses, all counters stay zero.
#[tokio::test(start_paused = true)]
async fn shutdown_at_t0_lets_nothing_through() {
    let sim = Simulation::new(fast_config()).unwrap();
    sim.request_stop();
    sim.start();
    sim.join().await;

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.spawned, 0);
    assert_eq!(snapshot.live_vehicles, 0);
    assert!(snapshot.lanes.iter().all(|lane| lane.passed == 0));
    assert_eq!(snapshot.phase.open, None);
}

/// With a generous time limit every spawned vehicle eventually exits, the
/// watchdog then stops the run on its own, and green is never shared by
/// both directions on the way there.
#[tokio::test(start_paused = true)]
async fn every_vehicle_eventually_exits_and_the_run_self_stops() {
    let config = SimulationConfig {
        vehicle_population: 8,
        simulation_time_limit: Duration::from_secs(300),
        ..fast_config()
    };
    let sim = Arc::new(Simulation::new(config).unwrap());
    sim.start();

    // Mutual exclusion of green, sampled over the whole run: lane permits
    // must never be available in both directions at the same instant.
    let exclusion_sampler = {
        let sim = Arc::clone(&sim);
        tokio::spawn(async move {
            while !sim.is_stopped() {
                let open_dirs = Direction::ALL
                    .iter()
                    .filter(|dir| {
                        sim.lanes()
                            .iter()
                            .any(|l| l.direction == **dir && l.gate.available() > 0)
                    })
                    .count();
                assert!(open_dirs <= 1, "both directions held open permits");
                sleep(Duration::from_millis(10)).await;
            }
        })
    };

    sim.join().await;
    exclusion_sampler.await.unwrap();

    assert!(sim.is_stopped(), "watchdog should have stopped the run");
    assert_eq!(sim.spawned_count(), 8);
    assert!(sim.registry().is_empty());
    let total_passed: u64 = sim.lanes().iter().map(|l| l.passed_count()).sum();
    assert_eq!(total_passed, 8);
}

/// After a mid-run stop plus one grace period: no further spawns, vehicles
/// already past the lane gate finish their crossing, everyone still queued
/// abandons without ever being counted as passed.
#[tokio::test(start_paused = true)]
async fn mid_run_shutdown_drains_cleanly() {
    let config = SimulationConfig {
        vehicle_population: 20,
        green_duration: Duration::from_millis(2000),
        yellow_duration: Duration::from_millis(300),
        spawn_interval: (Duration::from_millis(20), Duration::from_millis(50)),
        approach_time: (Duration::from_millis(10), Duration::from_millis(20)),
        crossing_time: (Duration::from_millis(150), Duration::from_millis(150)),
        lane_retry_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(50),
        simulation_time_limit: Duration::from_secs(60),
        rng_seed: Some(7),
        ..SimulationConfig::default()
    };
    let sim = Arc::new(Simulation::new(config).unwrap());
    sim.start();

    sleep(Duration::from_millis(1000)).await;
    sim.request_stop();
    // Grace: one lane-retry plus one poll slice, with margin.
    sleep(Duration::from_millis(500)).await;

    let at_grace = sim.snapshot();
    let passed_at_grace: u64 = at_grace.lanes.iter().map(|l| l.passed).sum();
    let committed = at_grace
        .vehicles
        .iter()
        .filter(|v| v.state == VehicleState::TryingToEnter)
        .count() as u64;

    sim.join().await;

    let final_snapshot = sim.snapshot();
    assert_eq!(
        final_snapshot.spawned, at_grace.spawned,
        "spawner kept creating vehicles after shutdown"
    );
    let final_passed: u64 = final_snapshot.lanes.iter().map(|l| l.passed).sum();
    assert_eq!(
        final_passed,
        passed_at_grace + committed,
        "only already-committed vehicles may still cross after shutdown"
    );
    assert_eq!(final_snapshot.live_vehicles, 0);
}
