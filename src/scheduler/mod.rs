use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{ScheduleConfig, SiteConfig};
use crate::fetch::WeatherSource;
use crate::observation::Observation;
use crate::queue::ObservationSink;

#[cfg(test)]
mod tests;

/// Drives fetch+publish cycles on a fixed wall-clock interval.
///
/// Strictly sequential: one cycle at a time, the first immediately on
/// startup. An overrunning cycle makes the next tick fire late rather
/// than queuing a concurrent one. The loop only exits on cancellation;
/// fetch and publish failures cost at most the current tick.
pub struct Scheduler<S, P> {
    schedule: ScheduleConfig,
    site: SiteConfig,
    source: S,
    sink: P,
}

impl<S: WeatherSource, P: ObservationSink> Scheduler<S, P> {
    pub fn new(schedule: ScheduleConfig, site: SiteConfig, source: S, sink: P) -> Self {
        Self {
            schedule,
            site,
            source,
            sink,
        }
    }

    /// Run the collection loop until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if !self.schedule.startup_delay.is_zero() {
            info!(
                delay_secs = self.schedule.startup_delay.as_secs(),
                "Waiting before first cycle"
            );
            if self.wait(self.schedule.startup_delay, &mut shutdown).await {
                info!("Scheduler stopped");
                return Ok(());
            }
        }

        info!(
            interval_secs = self.schedule.interval.as_secs(),
            "Starting collection loop"
        );

        // The first tick completes immediately; no wait for the first interval.
        let mut timer = interval(self.schedule.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(error) = self.run_cycle().await {
                error!(
                    error = %error,
                    cooldown_secs = self.schedule.cooldown.as_secs(),
                    "Unexpected cycle error, cooling down"
                );
                if self.wait(self.schedule.cooldown, &mut shutdown).await {
                    break;
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// One fetch+publish cycle.
    ///
    /// Fetch and publish failures are handled here and never escape; the
    /// Err path is the catch-all for anything unclassified, which the
    /// caller answers with a cooldown.
    async fn run_cycle(&self) -> Result<()> {
        let raw = match self.source.fetch_current().await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(error = %error, "Fetch failed, skipping this tick");
                return Ok(());
            }
        };

        let observation = Observation::from_raw(&raw, &self.site, Utc::now());
        info!(
            location = %observation.location,
            temperature = observation.temperature,
            humidity = observation.humidity,
            wind_speed = observation.wind_speed,
            condition = %observation.condition,
            "Collected observation"
        );

        if let Err(error) = self.sink.publish(&observation).await {
            error!(error = %error, "Publish failed, observation dropped");
        }

        Ok(())
    }

    /// Shutdown-interruptible sleep. Returns true if shutdown fired.
    async fn wait(&self, duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}
