/// Running-sum accumulator for sensor readings between uplinks
use crate::models::AveragedReading;

/// Offset added to every temperature before it is summed, keeping the sum positive
pub const TEMPERATURE_OFFSET: f64 = 60.0;
/// Scale applied to the offset temperature before it is summed
pub const TEMPERATURE_SCALE: f64 = 100.0;

/// Owns the sums and count of readings collected since the last uplink.
///
/// Temperatures are stored as `(t + 60) * 100` so that the wire encoding can be
/// computed from the mean exactly like the deployed decoder expects. Memory use
/// is constant regardless of how long the averaging window stays open.
#[derive(Debug, Default)]
pub struct SampleAccumulator {
    sum_temperature: f64,
    sum_humidity: f64,
    count: u32,
}

impl SampleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one valid reading. Callers must drop NaN/invalid reads beforehand.
    pub fn record(&mut self, temperature: f64, humidity: f64) {
        self.sum_temperature += (temperature + TEMPERATURE_OFFSET) * TEMPERATURE_SCALE;
        self.sum_humidity += humidity;
        self.count += 1;
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Number of readings waiting for the next uplink
    pub fn pending_sample_count(&self) -> u32 {
        self.count
    }

    /// Mean of the current window without consuming it
    pub fn average(&self) -> Option<AveragedReading> {
        if !self.has_data() {
            return None;
        }

        let count = f64::from(self.count);
        let temperature_internal = self.sum_temperature / count;

        Some(AveragedReading {
            temperature_internal,
            temperature: temperature_internal / TEMPERATURE_SCALE - TEMPERATURE_OFFSET,
            humidity: self.sum_humidity / count,
            samples: self.count,
        })
    }

    /// Compute the mean and reset the window.
    ///
    /// Returns `None` and leaves the accumulator untouched when it is empty.
    pub fn finalize(&mut self) -> Option<AveragedReading> {
        let reading = self.average()?;
        *self = Self::default();
        Some(reading)
    }
}
