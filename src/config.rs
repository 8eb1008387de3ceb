use log::info;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::format_duration;

// Upper bounds keep every deadline computation well inside the Instant range
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60; // one week
const MAX_AIRTIME_MS: u64 = 60_000;

/// Durations and flags that drive the uplink scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Wait between a successful join and the first uplink attempt
    pub first_uplink_delay: Duration,
    /// Wait after the first-ever completed uplink
    pub post_first_send_delay: Duration,
    pub steady_state_interval: Duration,
    /// Retry after the radio reported a pending TX/RX
    pub busy_retry: Duration,
    /// Retry after an attempt found no samples
    pub no_data_retry: Duration,
    pub confirmed_uplinks: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            first_uplink_delay: Duration::from_secs(900),
            post_first_send_delay: Duration::from_secs(10),
            steady_state_interval: Duration::from_secs(900),
            busy_retry: Duration::from_secs(60),
            no_data_retry: Duration::from_secs(60),
            confirmed_uplinks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadioSimConfig {
    pub join_delay: Duration,
    pub join_failures: u32,
    pub join_retry: Duration,
    pub airtime: Duration,
    /// Every Nth confirmed uplink is acknowledged, 0 disables acks
    pub ack_every: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSimConfig {
    pub base_temperature: f64,
    pub base_humidity: f64,
    /// Every Nth read fails, 0 disables failures
    pub failure_every: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub sample_interval: Duration,
    pub status_interval: Duration,
    pub schedule: ScheduleConfig,
    pub radio_sim: RadioSimConfig,
    pub sensor_sim: SensorSimConfig,
}

impl NodeConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source, applying defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str, default: u64| -> Result<Duration, Box<dyn std::error::Error>> {
            let value = parse_bounded(&lookup, key, default, MAX_INTERVAL_SECS)?;
            Ok(Duration::from_secs(value))
        };

        let schedule = ScheduleConfig {
            first_uplink_delay: secs("FIRST_UPLINK_DELAY_SECS", 900)?,
            post_first_send_delay: secs("POST_FIRST_SEND_DELAY_SECS", 10)?,
            steady_state_interval: secs("STEADY_STATE_INTERVAL_SECS", 900)?,
            busy_retry: secs("BUSY_RETRY_SECS", 60)?,
            no_data_retry: secs("NO_DATA_RETRY_SECS", 60)?,
            confirmed_uplinks: parse_bool(&lookup, "CONFIRMED_UPLINKS", true)?,
        };

        if schedule.busy_retry >= schedule.steady_state_interval {
            return Err("BUSY_RETRY_SECS must be shorter than STEADY_STATE_INTERVAL_SECS".into());
        }
        if schedule.no_data_retry >= schedule.steady_state_interval {
            return Err("NO_DATA_RETRY_SECS must be shorter than STEADY_STATE_INTERVAL_SECS".into());
        }

        let radio_sim = RadioSimConfig {
            join_delay: secs("SIM_JOIN_DELAY_SECS", 6)?,
            join_failures: parse_var(&lookup, "SIM_JOIN_FAILURES", 0)?,
            join_retry: secs("SIM_JOIN_RETRY_SECS", 30)?,
            airtime: Duration::from_millis(parse_bounded(
                &lookup,
                "SIM_AIRTIME_MS",
                1500,
                MAX_AIRTIME_MS,
            )?),
            ack_every: parse_var(&lookup, "SIM_ACK_EVERY", 1)?,
        };

        let sensor_sim = SensorSimConfig {
            base_temperature: parse_var(&lookup, "SIM_BASE_TEMPERATURE", 21.5)?,
            base_humidity: parse_var(&lookup, "SIM_BASE_HUMIDITY", 47.3)?,
            failure_every: parse_var(&lookup, "SIM_READ_FAILURE_EVERY", 0)?,
        };

        Ok(NodeConfig {
            sample_interval: secs("SAMPLE_INTERVAL_SECS", 5)?,
            status_interval: secs("STATUS_INTERVAL_SECS", 2)?,
            schedule,
            radio_sim,
            sensor_sim,
        })
    }

    pub fn log_summary(&self) {
        let s = &self.schedule;
        info!("Sampling every {}", format_duration(self.sample_interval));
        info!("Status update every {}", format_duration(self.status_interval));
        info!("First uplink {} after join", format_duration(s.first_uplink_delay));
        info!("Post-first-send delay: {}", format_duration(s.post_first_send_delay));
        info!("Steady-state interval: {}", format_duration(s.steady_state_interval));
        info!(
            "Retry intervals: busy {}, no data {}",
            format_duration(s.busy_retry),
            format_duration(s.no_data_retry)
        );
        info!("Confirmed uplinks: {}", s.confirmed_uplinks);
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("Invalid value for {}: '{}'", key, raw).into()),
        None => Ok(default),
    }
}

/// Parse a non-zero integer no larger than `max`
fn parse_bounded<F>(
    lookup: &F,
    key: &str,
    default: u64,
    max: u64,
) -> Result<u64, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parse_var(lookup, key, default)?;
    if value == 0 {
        return Err(format!("{} must be greater than zero", key).into());
    }
    if value > max {
        return Err(format!("{} must be at most {}", key, max).into());
    }
    Ok(value)
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(format!("Invalid value for {}: '{}'", key, other).into()),
    }
}
