/// Periodic status output of the node
use log::info;
use std::fmt;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use crate::models::AveragedReading;
use crate::node::accumulator::SampleAccumulator;
use crate::node::scheduler::{SchedulerState, UplinkScheduler};
use crate::utils::{format_datetime, format_duration};

/// What the status output shows at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: SchedulerState,
    pub last_average: AveragedReading,
    pub pending_samples: u32,
    pub uplinks_sent: u32,
    pub last_ack: Option<bool>,
    pub last_sequence_number: Option<u32>,
    /// Time until the transmit timer fires, None while joining or in flight
    pub next_uplink_in: Option<Duration>,
    pub taken_at: OffsetDateTime,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let next = match self.next_uplink_in {
            Some(remaining) => format_duration(remaining),
            None => "-".to_string(),
        };
        let ack = match self.last_ack {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };

        writeln!(f, "Last uplink average ({})", format_datetime(&self.taken_at))?;
        writeln!(f, "  Temperature: {:.2} C", self.last_average.temperature)?;
        writeln!(f, "  Humidity   : {:.2} %", self.last_average.humidity)?;
        writeln!(f, "  Samples    : {}", self.pending_samples)?;
        writeln!(
            f,
            "  Radio      : {}, {} sent, last ACK {}",
            self.state, self.uplinks_sent, ack
        )?;
        if let Some(seq) = self.last_sequence_number {
            writeln!(f, "  Last FCnt  : {}", seq)?;
        }
        write!(f, "  Next uplink: {}", next)
    }
}

/// Renders the latest average and live sample count on its own cadence.
///
/// Only borrows the scheduler and accumulator immutably, so it cannot
/// finalize or otherwise disturb the uplink bookkeeping.
pub struct StatusPublisher {
    interval: Duration,
    next_update: Option<Instant>,
}

impl StatusPublisher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_update: None,
        }
    }

    /// Current status regardless of the update cadence
    pub fn snapshot(
        now: Instant,
        scheduler: &UplinkScheduler,
        accumulator: &SampleAccumulator,
    ) -> StatusSnapshot {
        StatusSnapshot {
            state: scheduler.state(),
            last_average: scheduler.last_average(),
            pending_samples: accumulator.pending_sample_count(),
            uplinks_sent: scheduler.uplinks_sent(),
            last_ack: scheduler.last_ack(),
            last_sequence_number: scheduler.last_sequence_number(),
            next_uplink_in: scheduler
                .deadline()
                .map(|deadline| deadline.saturating_duration_since(now)),
            taken_at: OffsetDateTime::now_utc(),
        }
    }

    /// Publish a status update if one is due
    pub fn poll(
        &mut self,
        now: Instant,
        scheduler: &UplinkScheduler,
        accumulator: &SampleAccumulator,
    ) -> Option<StatusSnapshot> {
        if let Some(next) = self.next_update {
            if now < next {
                return None;
            }
        }
        self.next_update = Some(now + self.interval);

        let snapshot = Self::snapshot(now, scheduler, accumulator);
        for line in snapshot.to_string().lines() {
            info!("{}", line);
        }
        Some(snapshot)
    }
}
