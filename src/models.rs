use crate::node::accumulator::{TEMPERATURE_OFFSET, TEMPERATURE_SCALE};

/// A single temperature/humidity reading as returned by the sensor driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Averaged values captured when the accumulator is finalized.
///
/// `temperature` is in °C, already converted back from the internal
/// offset-and-scale representation. `temperature_internal` keeps the raw
/// `(t + 60) * 100` mean that the wire encoding is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedReading {
    pub temperature_internal: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub samples: u32,
}

impl Default for AveragedReading {
    /// 0 °C and 0 %, with the internal mean matching that temperature
    fn default() -> Self {
        Self {
            temperature_internal: TEMPERATURE_OFFSET * TEMPERATURE_SCALE,
            temperature: 0.0,
            humidity: 0.0,
            samples: 0,
        }
    }
}
