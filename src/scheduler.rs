//! Periodic sweep scheduling.
//!
//! The scheduler waits for an initial delay, then fires a sweep on every tick
//! of a fixed-period interval until it is told to shut down. Each sweep runs
//! in its own task, so a slow discovery backend never delays the next tick and
//! a panicking sweep never stops the schedule.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::sweep::DiscoverySweep;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Drives [`DiscoverySweep::run`] on a fixed schedule.
pub struct Scheduler {
    sweep: Arc<DiscoverySweep>,
    initial_delay: Duration,
    period: Duration,
}

impl Scheduler {
    pub fn new(sweep: Arc<DiscoverySweep>, initial_delay: Duration, period: Duration) -> Self {
        Self {
            sweep,
            initial_delay,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Spawns the schedule loop onto the runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs until `shutdown` changes or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            period_ms = self.period.as_millis() as u64,
            "sweep scheduler started"
        );

        tokio::select! {
            _ = time::sleep(self.initial_delay) => {}
            _ = shutdown.changed() => {
                info!("sweep scheduler stopped before first sweep");
                return;
            }
        }

        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick += 1;
                    debug!(tick, "firing sweep");
                    let sweep = self.sweep.clone();
                    tokio::spawn(async move {
                        // Dropping the report detaches the sampler tasks.
                        let _report = sweep.run().await;
                    });
                }
                _ = shutdown.changed() => {
                    info!(sweeps = tick, "sweep scheduler stopped");
                    break;
                }
            }
        }
    }
}
