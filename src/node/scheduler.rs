/// Uplink scheduling state machine
///
/// Decides when an uplink is attempted, encodes the accumulated average and
/// recovers from busy or empty attempts without losing samples.
use log::{debug, info, warn};
use std::fmt;
use std::time::Instant;

use crate::config::ScheduleConfig;
use crate::models::AveragedReading;
use crate::node::accumulator::SampleAccumulator;
use crate::radio::{RadioEvent, RadioStack, TransmitError, UplinkPayload};
use crate::utils::format_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Radio stack is joining, no timer armed
    AwaitingJoin,
    /// Joined, waiting for the post-join delay to run out
    AwaitingFirstUplink,
    Idle,
    /// A frame is with the radio stack, waiting for TX complete
    Transmitting,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::AwaitingJoin => "joining",
            SchedulerState::AwaitingFirstUplink => "joined, first uplink pending",
            SchedulerState::Idle => "idle",
            SchedulerState::Transmitting => "transmitting",
        };
        f.write_str(name)
    }
}

/// Result of a single transmission attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    Sent(UplinkPayload),
    SkippedBusy,
    SkippedNoData,
    SkippedInFlight,
    /// The radio refused the frame; the samples stay in the accumulator
    Rejected(TransmitError),
}

pub struct UplinkScheduler {
    config: ScheduleConfig,
    state: SchedulerState,
    deadline: Option<Instant>,
    in_flight: bool,
    last_average: AveragedReading,
    last_ack: Option<bool>,
    last_sequence_number: Option<u32>,
    uplinks_sent: u32,
}

impl UplinkScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            state: SchedulerState::AwaitingJoin,
            deadline: None,
            in_flight: false,
            last_average: AveragedReading::default(),
            last_ack: None,
            last_sequence_number: None,
            uplinks_sent: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Next time the transmit timer fires, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Most recently finalized average, zero before the first uplink
    pub fn last_average(&self) -> AveragedReading {
        self.last_average
    }

    pub fn last_ack(&self) -> Option<bool> {
        self.last_ack
    }

    pub fn last_sequence_number(&self) -> Option<u32> {
        self.last_sequence_number
    }

    pub fn uplinks_sent(&self) -> u32 {
        self.uplinks_sent
    }

    fn arm(&mut self, now: Instant, delay: std::time::Duration) {
        self.deadline = Some(now + delay);
    }

    /// Apply a radio stack notification
    pub fn handle_event(&mut self, event: RadioEvent, now: Instant) {
        match (self.state, event) {
            (SchedulerState::Transmitting, RadioEvent::JoinSucceeded) => {
                warn!("Join event while an uplink is in flight, ignored");
            }
            (_, RadioEvent::JoinSucceeded) => {
                info!(
                    "Joined network, first uplink in {}",
                    format_duration(self.config.first_uplink_delay)
                );
                self.state = SchedulerState::AwaitingFirstUplink;
                self.arm(now, self.config.first_uplink_delay);
            }
            (_, RadioEvent::JoinFailed) => {
                warn!("Join failed, waiting for the radio stack to retry");
            }
            (
                SchedulerState::Transmitting,
                RadioEvent::TransmitComplete {
                    acknowledged,
                    upstream_sequence_number,
                },
            ) => {
                if acknowledged {
                    info!("Uplink {} complete, ACK received", upstream_sequence_number);
                } else {
                    warn!("Uplink {} complete, no ACK", upstream_sequence_number);
                }

                self.in_flight = false;
                self.last_ack = Some(acknowledged);
                self.last_sequence_number = Some(upstream_sequence_number);

                let delay = if upstream_sequence_number == 1 {
                    self.config.post_first_send_delay
                } else {
                    self.config.steady_state_interval
                };
                info!("Next uplink in {}", format_duration(delay));
                self.arm(now, delay);
                self.state = SchedulerState::Idle;
            }
            (state, RadioEvent::TransmitComplete { .. }) => {
                warn!("Unexpected TX complete in state '{}', ignored", state);
            }
        }
    }

    /// Fire the transmit timer if its deadline has passed
    ///
    /// Returns the attempt outcome when the timer fired, None otherwise.
    pub fn poll_timer<R: RadioStack>(
        &mut self,
        now: Instant,
        accumulator: &mut SampleAccumulator,
        radio: &mut R,
    ) -> Option<AttemptOutcome> {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }
        self.deadline = None;

        match self.state {
            SchedulerState::AwaitingFirstUplink | SchedulerState::Idle => {
                Some(self.attempt_transmission(now, accumulator, radio))
            }
            SchedulerState::AwaitingJoin | SchedulerState::Transmitting => None,
        }
    }

    fn attempt_transmission<R: RadioStack>(
        &mut self,
        now: Instant,
        accumulator: &mut SampleAccumulator,
        radio: &mut R,
    ) -> AttemptOutcome {
        if radio.tx_rx_pending() {
            debug!("Radio busy, uplink skipped");
            self.arm(now, self.config.busy_retry);
            return AttemptOutcome::SkippedBusy;
        }

        let reading = match accumulator.average() {
            Some(reading) => reading,
            None => {
                debug!("No samples collected, uplink skipped");
                self.arm(now, self.config.no_data_retry);
                return AttemptOutcome::SkippedNoData;
            }
        };

        // Only the completion event may re-arm while a frame is in flight
        if self.in_flight {
            debug!("Previous uplink still in flight, skipped");
            return AttemptOutcome::SkippedInFlight;
        }

        let payload = UplinkPayload::encode(&reading);
        match radio.transmit(&payload, self.config.confirmed_uplinks, now) {
            Ok(_) => {
                self.in_flight = true;
                self.last_average = accumulator.finalize().unwrap_or(reading);
                self.uplinks_sent += 1;
                self.state = SchedulerState::Transmitting;

                let (t, h) = payload.raw_values();
                info!(
                    "Uplink sent: T={} H={} ({} samples, avg {:.2}°C / {:.2}%)",
                    t, h, reading.samples, reading.temperature, reading.humidity
                );
                AttemptOutcome::Sent(payload)
            }
            Err(e) => {
                warn!("Radio rejected uplink: {}", e);
                self.arm(now, self.config.busy_retry);
                AttemptOutcome::Rejected(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::Accepted;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRadio {
        busy: bool,
        reject: Option<TransmitError>,
        sent: Vec<(UplinkPayload, bool)>,
    }

    impl RadioStack for FakeRadio {
        fn start_join(&mut self, _now: Instant) {}

        fn tx_rx_pending(&self) -> bool {
            self.busy
        }

        fn transmit(
            &mut self,
            payload: &UplinkPayload,
            confirmed: bool,
            _now: Instant,
        ) -> Result<Accepted, TransmitError> {
            if let Some(e) = self.reject {
                return Err(e);
            }
            self.sent.push((*payload, confirmed));
            Ok(Accepted)
        }

        fn poll_event(&mut self, _now: Instant) -> Option<RadioEvent> {
            None
        }
    }

    // Every duration distinct so a mix-up shows up in the assertions
    fn schedule() -> ScheduleConfig {
        ScheduleConfig {
            first_uplink_delay: Duration::from_secs(900),
            post_first_send_delay: Duration::from_secs(10),
            steady_state_interval: Duration::from_secs(600),
            busy_retry: Duration::from_secs(60),
            no_data_retry: Duration::from_secs(45),
            confirmed_uplinks: true,
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn complete(seq: u32, acknowledged: bool) -> RadioEvent {
        RadioEvent::TransmitComplete {
            acknowledged,
            upstream_sequence_number: seq,
        }
    }

    fn joined_scheduler(start: Instant) -> UplinkScheduler {
        let mut scheduler = UplinkScheduler::new(schedule());
        scheduler.handle_event(RadioEvent::JoinSucceeded, start);
        scheduler
    }

    fn accumulator_with(samples: &[(f64, f64)]) -> SampleAccumulator {
        let mut acc = SampleAccumulator::new();
        for &(t, h) in samples {
            acc.record(t, h);
        }
        acc
    }

    #[test]
    fn test_starts_awaiting_join_without_timer() {
        let start = Instant::now();
        let mut scheduler = UplinkScheduler::new(schedule());
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        assert_eq!(scheduler.state(), SchedulerState::AwaitingJoin);
        assert_eq!(scheduler.deadline(), None);
        assert_eq!(scheduler.poll_timer(start + secs(10_000), &mut acc, &mut radio), None);
        assert!(radio.sent.is_empty());
    }

    #[test]
    fn test_join_failure_stays_awaiting_join() {
        let start = Instant::now();
        let mut scheduler = UplinkScheduler::new(schedule());
        scheduler.handle_event(RadioEvent::JoinFailed, start);
        assert_eq!(scheduler.state(), SchedulerState::AwaitingJoin);
        assert_eq!(scheduler.deadline(), None);
    }

    #[test]
    fn test_first_uplink_waits_for_post_join_delay() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(21.5, 47.3)]);
        let mut radio = FakeRadio::default();

        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert_eq!(scheduler.poll_timer(start + secs(899), &mut acc, &mut radio), None);
        assert!(radio.sent.is_empty());

        let outcome = scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        assert!(matches!(outcome, Some(AttemptOutcome::Sent(_))));
        assert_eq!(radio.sent.len(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Transmitting);

        // Timer is not re-armed while in flight
        assert_eq!(scheduler.deadline(), None);
        assert_eq!(scheduler.poll_timer(start + secs(5000), &mut acc, &mut radio), None);
        assert_eq!(radio.sent.len(), 1);
    }

    #[test]
    fn test_sent_payload_carries_average_and_resets_accumulator() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0), (21.0, 52.0), (22.0, 54.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);

        let (payload, confirmed) = radio.sent[0];
        assert!(confirmed);
        assert_eq!(payload.raw_values(), (210, 520));
        assert!(!acc.has_data());
        assert!(scheduler.in_flight());
        assert_eq!(scheduler.uplinks_sent(), 1);

        let last = scheduler.last_average();
        assert_eq!(last.samples, 3);
        assert!((last.humidity - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_skip_leaves_state_untouched() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0), (22.0, 40.0)]);
        let mut radio = FakeRadio {
            busy: true,
            ..Default::default()
        };

        let fire = start + secs(900);
        let outcome = scheduler.poll_timer(fire, &mut acc, &mut radio);

        assert_eq!(outcome, Some(AttemptOutcome::SkippedBusy));
        assert!(radio.sent.is_empty());
        assert_eq!(acc.pending_sample_count(), 2);
        assert_eq!(scheduler.last_average(), AveragedReading::default());
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert!(!scheduler.in_flight());
        assert_eq!(scheduler.deadline(), Some(fire + secs(60)));
    }

    #[test]
    fn test_no_data_skip_never_transmits() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = SampleAccumulator::new();
        let mut radio = FakeRadio::default();

        let fire = start + secs(900);
        let outcome = scheduler.poll_timer(fire, &mut acc, &mut radio);

        assert_eq!(outcome, Some(AttemptOutcome::SkippedNoData));
        assert!(radio.sent.is_empty());
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert_eq!(scheduler.deadline(), Some(fire + secs(45)));

        // Samples arriving before the retry get sent on the retry
        acc.record(19.0, 60.0);
        let outcome = scheduler.poll_timer(fire + secs(45), &mut acc, &mut radio);
        assert!(matches!(outcome, Some(AttemptOutcome::Sent(_))));
    }

    #[test]
    fn test_in_flight_skip_does_not_rearm() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        let fire = start + secs(900);
        scheduler.poll_timer(fire, &mut acc, &mut radio);
        assert!(scheduler.in_flight());

        acc.record(21.0, 51.0);
        let before = scheduler.last_average();
        let outcome = scheduler.attempt_transmission(fire + secs(1), &mut acc, &mut radio);

        assert_eq!(outcome, AttemptOutcome::SkippedInFlight);
        assert_eq!(scheduler.deadline(), None);
        assert_eq!(radio.sent.len(), 1);
        assert_eq!(acc.pending_sample_count(), 1);
        assert_eq!(scheduler.last_average(), before);
        assert_eq!(scheduler.state(), SchedulerState::Transmitting);
    }

    #[test]
    fn test_first_completion_uses_short_delay() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        let done = start + secs(902);
        scheduler.handle_event(complete(1, true), done);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.in_flight());
        assert_eq!(scheduler.last_ack(), Some(true));
        assert_eq!(scheduler.last_sequence_number(), Some(1));
        assert_eq!(scheduler.deadline(), Some(done + secs(10)));
    }

    #[test]
    fn test_later_completion_uses_steady_interval() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        let done = start + secs(902);
        scheduler.handle_event(complete(2, true), done);

        assert_eq!(scheduler.deadline(), Some(done + secs(600)));
    }

    #[test]
    fn test_missing_ack_still_completes() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        let done = start + secs(902);
        scheduler.handle_event(complete(7, false), done);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.in_flight());
        assert_eq!(scheduler.last_ack(), Some(false));
        assert_eq!(scheduler.deadline(), Some(done + secs(600)));
    }

    #[test]
    fn test_idle_timer_sends_next_window() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        let done = start + secs(902);
        scheduler.handle_event(complete(1, true), done);

        acc.record(30.0, 70.0);
        assert_eq!(scheduler.poll_timer(done + secs(9), &mut acc, &mut radio), None);
        let outcome = scheduler.poll_timer(done + secs(10), &mut acc, &mut radio);

        assert!(matches!(outcome, Some(AttemptOutcome::Sent(_))));
        assert_eq!(radio.sent[1].0.raw_values(), (300, 700));
        assert_eq!(scheduler.uplinks_sent(), 2);
    }

    #[test]
    fn test_rejected_transmit_keeps_samples() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio {
            reject: Some(TransmitError::Busy),
            ..Default::default()
        };

        let fire = start + secs(900);
        let outcome = scheduler.poll_timer(fire, &mut acc, &mut radio);

        assert_eq!(outcome, Some(AttemptOutcome::Rejected(TransmitError::Busy)));
        assert_eq!(acc.pending_sample_count(), 1);
        assert!(!scheduler.in_flight());
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert_eq!(scheduler.deadline(), Some(fire + secs(60)));
    }

    #[test]
    fn test_spurious_completion_ignored() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let armed = scheduler.deadline();

        scheduler.handle_event(complete(1, true), start + secs(5));

        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert_eq!(scheduler.deadline(), armed);
        assert_eq!(scheduler.last_ack(), None);
    }

    #[test]
    fn test_rejoin_restarts_post_join_delay() {
        let start = Instant::now();
        let mut scheduler = joined_scheduler(start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);

        // Ignored while in flight
        scheduler.handle_event(RadioEvent::JoinSucceeded, start + secs(901));
        assert_eq!(scheduler.state(), SchedulerState::Transmitting);

        let done = start + secs(902);
        scheduler.handle_event(complete(3, true), done);
        let rejoin = done + secs(100);
        scheduler.handle_event(RadioEvent::JoinSucceeded, rejoin);

        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstUplink);
        assert_eq!(scheduler.deadline(), Some(rejoin + secs(900)));
    }

    #[test]
    fn test_unconfirmed_uplinks_configurable() {
        let start = Instant::now();
        let mut scheduler = UplinkScheduler::new(ScheduleConfig {
            confirmed_uplinks: false,
            ..schedule()
        });
        scheduler.handle_event(RadioEvent::JoinSucceeded, start);
        let mut acc = accumulator_with(&[(20.0, 50.0)]);
        let mut radio = FakeRadio::default();

        scheduler.poll_timer(start + secs(900), &mut acc, &mut radio);
        assert!(!radio.sent[0].1);
    }
}
