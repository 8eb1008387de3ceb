/// Temperature/humidity sensor interface
pub mod simulated;

use std::fmt;

use crate::models::SensorReading;

pub use simulated::SimulatedSht31;

// SHT31 operating range
const MIN_TEMPERATURE: f64 = -40.0;
const MAX_TEMPERATURE: f64 = 125.0;
const MIN_HUMIDITY: f64 = 0.0;
const MAX_HUMIDITY: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// The driver returned NaN or an infinite value
    NotANumber,
    OutOfRange(SensorReading),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::NotANumber => write!(f, "sensor returned NaN"),
            ReadError::OutOfRange(r) => write!(
                f,
                "reading out of range: temp={:.2}°C, humidity={:.2}%",
                r.temperature, r.humidity
            ),
        }
    }
}

impl std::error::Error for ReadError {}

/// Non-blocking sensor read source
pub trait SensorDriver {
    fn read(&mut self) -> Result<SensorReading, ReadError>;
}

/// Reject readings that must not enter the accumulator
pub fn validate_reading(reading: SensorReading) -> Result<SensorReading, ReadError> {
    if !reading.temperature.is_finite() || !reading.humidity.is_finite() {
        return Err(ReadError::NotANumber);
    }

    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&reading.temperature)
        || !(MIN_HUMIDITY..=MAX_HUMIDITY).contains(&reading.humidity)
    {
        return Err(ReadError::OutOfRange(reading));
    }

    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64, humidity: f64) -> SensorReading {
        SensorReading { temperature, humidity }
    }

    #[test]
    fn test_valid_reading_passes() {
        assert_eq!(validate_reading(reading(21.5, 47.3)), Ok(reading(21.5, 47.3)));
        assert!(validate_reading(reading(-40.0, 0.0)).is_ok());
        assert!(validate_reading(reading(125.0, 100.0)).is_ok());
    }

    #[test]
    fn test_nan_rejected() {
        assert_eq!(validate_reading(reading(f64::NAN, 50.0)), Err(ReadError::NotANumber));
        assert_eq!(validate_reading(reading(20.0, f64::NAN)), Err(ReadError::NotANumber));
        assert_eq!(
            validate_reading(reading(f64::INFINITY, 50.0)),
            Err(ReadError::NotANumber)
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            validate_reading(reading(130.0, 50.0)),
            Err(ReadError::OutOfRange(_))
        ));
        assert!(matches!(
            validate_reading(reading(20.0, 101.0)),
            Err(ReadError::OutOfRange(_))
        ));
    }
}
