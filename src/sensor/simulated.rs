/// Simulated SHT31 temperature/humidity sensor
use crate::config::SensorSimConfig;
use crate::models::SensorReading;
use crate::sensor::{ReadError, SensorDriver};

const TEMPERATURE_SWING: f64 = 0.8; // °C
const HUMIDITY_SWING: f64 = 2.5; // %RH

/// Produces a slow deterministic drift around the configured base values.
/// Every `failure_every`-th read returns NaN, like the real driver does on a
/// CRC or I2C failure.
pub struct SimulatedSht31 {
    config: SensorSimConfig,
    reads: u64,
}

impl SimulatedSht31 {
    pub fn new(config: SensorSimConfig) -> Self {
        Self { config, reads: 0 }
    }
}

impl SensorDriver for SimulatedSht31 {
    fn read(&mut self) -> Result<SensorReading, ReadError> {
        self.reads += 1;

        if self.config.failure_every > 0 && self.reads % self.config.failure_every == 0 {
            return Ok(SensorReading {
                temperature: f64::NAN,
                humidity: f64::NAN,
            });
        }

        let phase = self.reads as f64;
        Ok(SensorReading {
            temperature: self.config.base_temperature + TEMPERATURE_SWING * (phase * 0.05).sin(),
            humidity: self.config.base_humidity + HUMIDITY_SWING * (phase * 0.03).cos(),
        })
    }
}
