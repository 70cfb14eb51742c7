// Main entry point - Configuration, wiring and shutdown handling
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::application::pipeline::Pipeline;
use crate::application::snapshot_consumer::SnapshotConsumer;
use crate::infrastructure::config::load_config;
use crate::infrastructure::csv_logger::CsvLogger;
use crate::infrastructure::simulated_sensor::SimulatedSensorLink;
use crate::presentation::terminal_display::{PlotLayout, TerminalDisplay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the display
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;

    let shutdown = CancellationToken::new();
    let link = Arc::new(SimulatedSensorLink::new(
        config.simulated_cadence_rpm,
        config.gear_ratio(),
        Duration::from_millis(config.notification_interval_ms),
        shutdown.clone(),
    ));

    let consumers: Vec<Box<dyn SnapshotConsumer>> = vec![
        Box::new(TerminalDisplay::new(PlotLayout {
            width: config.terminal_width,
            max_speed: config.max_speed,
            speed_interval: config.speed_interval,
        })),
        Box::new(CsvLogger::create(&config.workout_dir)?),
    ];

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down...");
                ctrl_c.cancel();
            }
            Err(e) => tracing::error!("Unable to listen for Ctrl-C, shutdown disabled: {}", e),
        }
    });

    let pipeline = Pipeline::new(link, config.pipeline_settings());
    pipeline.run(consumers, shutdown).await?;

    Ok(())
}
