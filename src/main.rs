use std::sync::Arc;
use std::time::Duration;

use intersection_sim::{Simulation, SimulationConfig};

/// Headless run with the default configuration. Stands in for the GUI: a
/// JSON snapshot line per second on stdout, a per-lane summary at the end.
/// Logging goes through env_logger (`RUST_LOG=info` for the event stream).
#[tokio::main]
async fn main() {
    env_logger::init();

    let sim = Arc::new(Simulation::new(SimulationConfig::default()).expect("default config"));
    sim.start();

    let reporter = {
        let sim = Arc::clone(&sim);
        tokio::spawn(async move {
            while !sim.is_stopped() {
                match serde_json::to_string(&sim.snapshot()) {
                    Ok(line) => println!("{line}"),
                    Err(err) => log::error!("snapshot serialization failed: {err}"),
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    };

    sim.join().await;
    reporter.await.ok();

    let summary = sim.snapshot();
    for lane in &summary.lanes {
        log::info!("{} | passed: {}", lane.name, lane.passed);
    }
    log::info!(
        "run complete: {} vehicles spawned, {} crossed in total",
        summary.spawned,
        summary.lanes.iter().map(|l| l.passed).sum::<u64>()
    );
}
