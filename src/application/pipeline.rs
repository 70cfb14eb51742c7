// Pipeline orchestrator - Sensor link -> decoder/aggregator -> snapshot fan-out
use crate::application::sensor_link::{find_sensor, ScanPolicy, SensorLink};
use crate::application::session_processor::{RideGeometry, SessionProcessor};
use crate::application::snapshot_consumer::{run_consumer, SnapshotConsumer};
use anyhow::Context;
use chrono::Utc;
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Per-consumer snapshot backlog; a lagging consumer loses the oldest snapshots
pub const SNAPSHOT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub characteristic_uuid: String,
    pub sensor_name_filter: String,
    pub scan: ScanPolicy,
    pub geometry: RideGeometry,
    pub history_capacity: usize,
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames: usize,
    pub malformed: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    link: Arc<dyn SensorLink>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(link: Arc<dyn SensorLink>, settings: PipelineSettings) -> Self {
        Self { link, settings }
    }

    /// Run one session. Every consumer sees every snapshot unless it falls
    /// more than `SNAPSHOT_QUEUE_CAPACITY` behind.
    pub async fn run(
        &self,
        consumers: Vec<Box<dyn SnapshotConsumer>>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<SessionReport> {
        let mut report = SessionReport::default();

        let Some(device) = find_sensor(
            self.link.as_ref(),
            &self.settings.sensor_name_filter,
            self.settings.scan,
            &shutdown,
        )
        .await
        else {
            tracing::error!("No sensor found. Please ensure the sensor is active and try again.");
            return Ok(report);
        };

        tracing::info!("Connecting to sensor at {}...", device.address);
        let notifications = self
            .link
            .subscribe(&device, &self.settings.characteristic_uuid)
            .await
            .with_context(|| format!("Failed to start notifications from {}", device.address))?;
        tracing::info!("Notifications started. Listening for data...");

        let (tx, _) = broadcast::channel(SNAPSHOT_QUEUE_CAPACITY);
        let handles: Vec<_> = consumers
            .into_iter()
            .map(|consumer| {
                let rx = tx.subscribe();
                tokio::spawn(run_consumer(consumer, rx, shutdown.clone()))
            })
            .collect();

        let mut processor = SessionProcessor::new(
            self.settings.geometry,
            self.settings.history_capacity,
            Utc::now(),
        );
        let mut stream =
            pin!(ReceiverStream::new(notifications).take_until(shutdown.cancelled()));

        while let Some(raw) = stream.next().await {
            match processor.process(&raw, Utc::now()) {
                Ok(snapshot) => {
                    report.frames += 1;
                    if tx.send(snapshot).is_err() {
                        tracing::debug!("Snapshot produced with no active consumers");
                    }
                }
                Err(e) => {
                    report.malformed += 1;
                    tracing::warn!("Dropping malformed frame ({} bytes): {}", raw.len(), e);
                }
            }
        }

        if shutdown.is_cancelled() {
            tracing::info!("Shutdown requested, stopping pipeline");
        } else {
            tracing::info!("Sensor notification stream ended");
        }
        drop(tx);

        for outcome in futures::future::join_all(handles).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Consumer finished with error: {:#}", e),
                Err(e) => tracing::error!("Consumer task panicked: {}", e),
            }
        }

        tracing::info!(
            "Session ended: {} frames, {} malformed",
            report.frames,
            report.malformed
        );
        Ok(report)
    }
}
