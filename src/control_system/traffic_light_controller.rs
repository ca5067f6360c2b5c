use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::simulation_engine::lanes::{Direction, Lane};
use crate::simulation_engine::shutdown::ShutdownSignal;

/// What the lights currently show. Written only by the controller loop;
/// everything else (vehicles deciding whether to keep waiting, snapshots)
/// just reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    /// Direction with the green (or yellow) light. `None` during the all-red
    /// instant between phases and after shutdown.
    pub open: Option<Direction>,
    /// True during the yellow window: permits already handed out stay valid
    /// but no new ones are added.
    pub yellow: bool,
}

impl PhaseState {
    const ALL_RED: PhaseState = PhaseState {
        open: None,
        yellow: false,
    };
}

/// Cyclic phase controller: green then yellow for each direction in turn.
///
/// On green it opens every lane gate of that direction with the configured
/// permit budget; at the end of yellow it drains them, so no permit carries
/// into the next cycle. All waits are sliced by the poll interval, which
/// bounds shutdown latency. The controller has no recoverable errors; any
/// internal fault panics and takes the run down.
pub struct TrafficLightController {
    lanes: Vec<Arc<Lane>>,
    state: Mutex<PhaseState>,
    shutdown: ShutdownSignal,
    green_duration: Duration,
    yellow_duration: Duration,
    permits_per_green: usize,
    poll_interval: Duration,
}

impl TrafficLightController {
    pub fn new(
        lanes: Vec<Arc<Lane>>,
        shutdown: ShutdownSignal,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            lanes,
            state: Mutex::new(PhaseState::ALL_RED),
            shutdown,
            green_duration: config.green_duration,
            yellow_duration: config.yellow_duration,
            permits_per_green: config.permits_per_green,
            poll_interval: config.poll_interval,
        }
    }

    pub fn current_phase(&self) -> PhaseState {
        *self.state.lock().unwrap()
    }

    /// Runs the light cycle until shutdown, checked at every phase boundary
    /// and within every sleep.
    pub async fn run_update_loop(self: Arc<Self>) {
        'cycle: loop {
            for direction in Direction::ALL {
                if self.shutdown.is_stopped() {
                    break 'cycle;
                }

                self.begin_green(direction);
                if !self
                    .shutdown
                    .sleep_with_check(self.green_duration, self.poll_interval)
                    .await
                {
                    self.end_phase(direction);
                    break 'cycle;
                }

                self.begin_yellow(direction);
                if !self
                    .shutdown
                    .sleep_with_check(self.yellow_duration, self.poll_interval)
                    .await
                {
                    self.end_phase(direction);
                    break 'cycle;
                }

                self.end_phase(direction);
            }
        }

        // Late waiters must not find a stale permit after the run stops.
        for lane in &self.lanes {
            lane.gate.close_window();
        }
        log::info!("traffic light controller stopped");
    }

    fn begin_green(&self, direction: Direction) {
        *self.state.lock().unwrap() = PhaseState {
            open: Some(direction),
            yellow: false,
        };
        for lane in self.lanes_of(direction) {
            lane.gate.open_window(self.permits_per_green);
        }
        log::info!(
            "light {}: GREEN ({} permits per lane)",
            direction,
            self.permits_per_green
        );
    }

    fn begin_yellow(&self, direction: Direction) {
        self.state.lock().unwrap().yellow = true;
        log::info!("light {}: YELLOW", direction);
    }

    /// Closes the direction's gates and drops into all-red.
    fn end_phase(&self, direction: Direction) {
        let mut discarded = 0;
        for lane in self.lanes_of(direction) {
            discarded += lane.gate.close_window();
        }
        *self.state.lock().unwrap() = PhaseState::ALL_RED;
        log::info!("light {}: RED ({} unused permits discarded)", direction, discarded);
    }

    fn lanes_of(&self, direction: Direction) -> impl Iterator<Item = &Arc<Lane>> {
        self.lanes.iter().filter(move |l| l.direction == direction)
    }
}
