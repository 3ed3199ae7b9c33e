//! Periodic liveness heartbeat.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Emits a heartbeat log line every `interval` until cancelled.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitor {
    interval: Duration,
}

impl HealthMonitor {
    /// Periods under one second are raised to one second.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Run until `cancel` fires. Returns the number of heartbeats emitted.
    ///
    /// The first heartbeat comes one full interval after start.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut beats = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    beats += 1;
                    tracing::info!(beats, "Bot health check: Active and running");
                }
            }
        }

        tracing::debug!(beats, "Health monitor stopped");
        beats
    }
}
