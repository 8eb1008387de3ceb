mod config;
mod models;
mod node;
mod radio;
mod sensor;
mod utils;

use log::{error, info};
use std::time::Instant;
use time::OffsetDateTime;
use tokio::time::{interval, Duration, MissedTickBehavior};

use config::NodeConfig;
use node::SensorNode;
use radio::{RadioStack, SimulatedLoRaWan};
use sensor::{SensorDriver, SimulatedSht31};
use utils::format_datetime;

const LOOP_TICK_MILLIS: u64 = 100;

async fn main_loop<S: SensorDriver, R: RadioStack>(node: &mut SensorNode<S, R>) {
    let mut ticker = interval(Duration::from_millis(LOOP_TICK_MILLIS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    node.start(Instant::now());

    loop {
        ticker.tick().await;
        node.tick(Instant::now());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match NodeConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        "Starting sensor node at {}",
        format_datetime(&OffsetDateTime::now_utc())
    );
    config.log_summary();

    let mut node = SensorNode::new(
        &config,
        SimulatedSht31::new(config.sensor_sim.clone()),
        SimulatedLoRaWan::new(config.radio_sim.clone()),
    );

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    tokio::select! {
        _ = main_loop(&mut node) => {}
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    let status = node.status(Instant::now());
    info!("Summary:");
    info!("  Joined: {}", node.radio().is_joined());
    info!("  Uplinks sent: {}", status.uplinks_sent);
    if node.scheduler().in_flight() {
        info!("  Uplink still in flight at shutdown");
    }
    info!("  Last average temperature: {:.2}°C", status.last_average.temperature);
    info!("  Last average humidity: {:.2}%", status.last_average.humidity);
    info!("  Samples not yet sent: {}", status.pending_samples);

    Ok(())
}
