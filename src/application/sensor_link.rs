// Sensor link trait - Discovery and notification subscription
use crate::domain::csc::RawNotification;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDevice {
    pub name: String,
    pub address: String,
}

#[async_trait]
pub trait SensorLink: Send + Sync {
    /// One scan attempt; returns the first device whose name contains `name_filter`
    async fn discover(
        &self,
        name_filter: &str,
        scan_timeout: Duration,
    ) -> anyhow::Result<Option<SensorDevice>>;

    /// Start notifications for a characteristic. The receiver closes on link loss.
    async fn subscribe(
        &self,
        device: &SensorDevice,
        characteristic_uuid: &str,
    ) -> anyhow::Result<mpsc::Receiver<RawNotification>>;
}

/// Scan retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    pub retry_duration: Duration,
    pub scan_interval: Duration,
}

/// Repeat discovery until a sensor shows up, the retry window closes or shutdown is requested
pub async fn find_sensor(
    link: &dyn SensorLink,
    name_filter: &str,
    policy: ScanPolicy,
    shutdown: &CancellationToken,
) -> Option<SensorDevice> {
    let started = tokio::time::Instant::now();

    while started.elapsed() < policy.retry_duration {
        if shutdown.is_cancelled() {
            tracing::info!("Scan aborted by shutdown");
            return None;
        }

        tracing::info!(
            "Scanning for devices (up to {} seconds)...",
            policy.scan_interval.as_secs_f64()
        );
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => return None,
            attempt = link.discover(name_filter, policy.scan_interval) => attempt,
        };

        match attempt {
            Ok(Some(device)) => {
                tracing::info!("Sensor found: {} ({})", device.name, device.address);
                return Some(device);
            }
            Ok(None) => tracing::info!("No matching sensor found. Retrying..."),
            Err(e) => tracing::error!("Exception during scanning: {:#}", e),
        }
    }

    tracing::error!(
        "Failed to find a matching sensor within {} seconds",
        policy.retry_duration.as_secs()
    );
    None
}
