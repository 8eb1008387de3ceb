/// Sensor node application context and run-loop tick
pub mod accumulator;
pub mod scheduler;
pub mod status;

use log::{debug, warn};
use std::time::{Duration, Instant};

use crate::config::NodeConfig;
use crate::radio::RadioStack;
use crate::sensor::{validate_reading, SensorDriver};

pub use accumulator::SampleAccumulator;
pub use scheduler::{AttemptOutcome, UplinkScheduler};
pub use status::{StatusPublisher, StatusSnapshot};

/// Owns every piece of node state; the run loop drives it through `tick`.
///
/// All mutation happens from the single caller of `tick`, so no locking is
/// needed between sampling, scheduling and status output.
pub struct SensorNode<S: SensorDriver, R: RadioStack> {
    sensor: S,
    radio: R,
    accumulator: SampleAccumulator,
    scheduler: UplinkScheduler,
    status: StatusPublisher,
    sample_interval: Duration,
    next_sample: Option<Instant>,
}

impl<S: SensorDriver, R: RadioStack> SensorNode<S, R> {
    pub fn new(config: &NodeConfig, sensor: S, radio: R) -> Self {
        Self {
            sensor,
            radio,
            accumulator: SampleAccumulator::new(),
            scheduler: UplinkScheduler::new(config.schedule.clone()),
            status: StatusPublisher::new(config.status_interval),
            sample_interval: config.sample_interval,
            next_sample: None,
        }
    }

    /// Kick off the network join; the first sample is due one interval later
    pub fn start(&mut self, now: Instant) {
        self.next_sample = Some(now + self.sample_interval);
        self.radio.start_join(now);
    }

    /// One run-loop iteration: radio events, sampling, transmit timer, status.
    ///
    /// Returns the outcome if the transmit timer fired during this tick.
    pub fn tick(&mut self, now: Instant) -> Option<AttemptOutcome> {
        while let Some(event) = self.radio.poll_event(now) {
            debug!("Radio event: {:?}", event);
            self.scheduler.handle_event(event, now);
        }

        if self.next_sample.map_or(true, |due| now >= due) {
            self.next_sample = Some(now + self.sample_interval);
            self.take_sample();
        }

        let outcome = self
            .scheduler
            .poll_timer(now, &mut self.accumulator, &mut self.radio);

        self.status.poll(now, &self.scheduler, &self.accumulator);

        outcome
    }

    fn take_sample(&mut self) {
        match self.sensor.read().and_then(validate_reading) {
            Ok(reading) => {
                self.accumulator.record(reading.temperature, reading.humidity);
                debug!(
                    "Sample taken: temp={:.2}°C, humidity={:.2}% ({} pending)",
                    reading.temperature,
                    reading.humidity,
                    self.accumulator.pending_sample_count()
                );
            }
            Err(e) => warn!("Sensor read failed: {}", e),
        }
    }

    pub fn scheduler(&self) -> &UplinkScheduler {
        &self.scheduler
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn status(&self, now: Instant) -> StatusSnapshot {
        StatusPublisher::snapshot(now, &self.scheduler, &self.accumulator)
    }
}
