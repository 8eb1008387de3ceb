/// Uplink payload encoding for averaged readings
use log::warn;

use crate::models::AveragedReading;
use crate::node::accumulator::{TEMPERATURE_OFFSET, TEMPERATURE_SCALE};

/// Size of the uplink frame in bytes
pub const PAYLOAD_LEN: usize = 4;

/// Fixed-point resolution of both fields on the wire (0.1 units)
const WIRE_SCALE: f64 = 10.0;

/// Encoded averaged reading, ready to hand to the radio stack
///
/// Layout (big-endian):
/// - Bytes 0-1: Temperature (signed 16-bit, 0.1°C resolution)
/// - Bytes 2-3: Humidity (signed 16-bit, 0.1% resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkPayload([u8; PAYLOAD_LEN]);

impl UplinkPayload {
    /// Encode an averaged reading.
    ///
    /// Temperature is taken from the internal `(t + 60) * 100` mean and mapped
    /// to `round((mean / 100 - 60) * 10)`; humidity to `round(h * 10)`. Values
    /// outside the i16 range saturate.
    pub fn encode(reading: &AveragedReading) -> Self {
        let t = ((reading.temperature_internal / TEMPERATURE_SCALE - TEMPERATURE_OFFSET)
            * WIRE_SCALE)
            .round() as i16;
        let h = (reading.humidity * WIRE_SCALE).round() as i16;

        let [t_hi, t_lo] = t.to_be_bytes();
        let [h_hi, h_lo] = h.to_be_bytes();
        UplinkPayload([t_hi, t_lo, h_hi, h_lo])
    }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.0
    }

    /// Raw 16-bit values as they appear on the wire
    pub fn raw_values(&self) -> (i16, i16) {
        (
            i16::from_be_bytes([self.0[0], self.0[1]]),
            i16::from_be_bytes([self.0[2], self.0[3]]),
        )
    }
}

/// Decode an uplink frame back into temperature (°C) and humidity (%)
///
/// Mirrors what the network-side decoder does. Returns None if the frame
/// has the wrong length.
pub fn decode_payload(data: &[u8]) -> Option<(f64, f64)> {
    if data.len() != PAYLOAD_LEN {
        warn!("Invalid uplink payload: len={}", data.len());
        return None;
    }

    let t = i16::from_be_bytes([data[0], data[1]]);
    let h = i16::from_be_bytes([data[2], data[3]]);
    Some((f64::from(t) / WIRE_SCALE, f64::from(h) / WIRE_SCALE))
}
