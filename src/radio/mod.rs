/// Radio stack interface consumed by the uplink scheduler
pub mod payload;
pub mod simulated;

use std::fmt;
use std::time::Instant;

pub use payload::UplinkPayload;
pub use simulated::SimulatedLoRaWan;

/// Notifications pushed from the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    JoinSucceeded,
    JoinFailed,
    TransmitComplete {
        acknowledged: bool,
        upstream_sequence_number: u32,
    },
}

/// The frame was queued for transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// A transmit/receive cycle is already pending
    Busy,
    /// No session has been established yet
    NotJoined,
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmitError::Busy => write!(f, "radio busy with pending TX/RX"),
            TransmitError::NotJoined => write!(f, "radio has not joined a network"),
        }
    }
}

impl std::error::Error for TransmitError {}

/// Black-box LoRaWAN MAC stack
///
/// Calls never block. Outcomes of long-running operations (join, transmit)
/// are reported later through `poll_event`.
pub trait RadioStack {
    fn start_join(&mut self, now: Instant);

    /// Whether a transmit/receive operation is currently pending
    fn tx_rx_pending(&self) -> bool;

    fn transmit(
        &mut self,
        payload: &UplinkPayload,
        confirmed: bool,
        now: Instant,
    ) -> Result<Accepted, TransmitError>;

    /// Next event that has become due at `now`, if any
    fn poll_event(&mut self, now: Instant) -> Option<RadioEvent>;
}
