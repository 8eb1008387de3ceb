/// Simulated LoRaWAN stack for running the node without radio hardware
use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::config::RadioSimConfig;
use crate::radio::payload::decode_payload;
use crate::radio::{Accepted, RadioEvent, RadioStack, TransmitError, UplinkPayload};

/// Operation currently occupying the simulated radio
#[derive(Debug, Clone, Copy, PartialEq)]
enum Operation {
    Idle,
    Joining {
        due: Instant,
    },
    TxRx {
        due: Instant,
        acknowledged: bool,
        sequence_number: u32,
    },
}

/// Emulates the observable behaviour of a LoRaWAN MAC:
/// - join handshake that takes `join_delay` and may fail a configured number
///   of times, retrying on its own after `join_retry`
/// - transmit/receive cycle lasting `airtime`, during which the stack is busy
/// - upstream frame counter starting at 1 for the first uplink
/// - acknowledgment of every `ack_every`-th confirmed uplink
pub struct SimulatedLoRaWan {
    config: RadioSimConfig,
    operation: Operation,
    joined: bool,
    failed_joins: u32,
    sequence_number_up: u32,
}

impl SimulatedLoRaWan {
    pub fn new(config: RadioSimConfig) -> Self {
        Self {
            config,
            operation: Operation::Idle,
            joined: false,
            failed_joins: 0,
            sequence_number_up: 0,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    fn schedule_join(&mut self, now: Instant, delay: Duration) {
        self.operation = Operation::Joining { due: now + delay };
    }
}

impl RadioStack for SimulatedLoRaWan {
    fn start_join(&mut self, now: Instant) {
        info!("Joining network...");
        self.joined = false;
        self.schedule_join(now, self.config.join_delay);
    }

    fn tx_rx_pending(&self) -> bool {
        matches!(self.operation, Operation::TxRx { .. })
    }

    fn transmit(
        &mut self,
        payload: &UplinkPayload,
        confirmed: bool,
        now: Instant,
    ) -> Result<Accepted, TransmitError> {
        if !self.joined {
            return Err(TransmitError::NotJoined);
        }
        if self.tx_rx_pending() {
            return Err(TransmitError::Busy);
        }

        self.sequence_number_up += 1;
        let acknowledged = confirmed
            && self.config.ack_every > 0
            && self.sequence_number_up % self.config.ack_every == 0;

        if let Some((t, h)) = decode_payload(payload.as_bytes()) {
            debug!(
                "Network would decode frame {}: temp={:.1}°C, humidity={:.1}%",
                self.sequence_number_up, t, h
            );
        }

        self.operation = Operation::TxRx {
            due: now + self.config.airtime,
            acknowledged,
            sequence_number: self.sequence_number_up,
        };
        Ok(Accepted)
    }

    fn poll_event(&mut self, now: Instant) -> Option<RadioEvent> {
        match self.operation {
            Operation::Joining { due } if now >= due => {
                if self.failed_joins < self.config.join_failures {
                    self.failed_joins += 1;
                    warn!(
                        "Simulated join attempt {} failed, retrying in {}s",
                        self.failed_joins,
                        self.config.join_retry.as_secs()
                    );
                    self.schedule_join(now, self.config.join_retry);
                    Some(RadioEvent::JoinFailed)
                } else {
                    self.operation = Operation::Idle;
                    self.joined = true;
                    Some(RadioEvent::JoinSucceeded)
                }
            }
            Operation::TxRx {
                due,
                acknowledged,
                sequence_number,
            } if now >= due => {
                self.operation = Operation::Idle;
                Some(RadioEvent::TransmitComplete {
                    acknowledged,
                    upstream_sequence_number: sequence_number,
                })
            }
            _ => None,
        }
    }
}
