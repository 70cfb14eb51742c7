// Simulated CSC sensor link - Stands in for a BLE adapter
use crate::application::sensor_link::{SensorDevice, SensorLink};
use crate::domain::csc::{
    CrankData, CscMeasurement, RawNotification, WheelData, FLAG_CRANK_DATA, FLAG_WHEEL_DATA,
};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEVICE_NAME: &str = "CAD-SIM";
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// Crank position of a rider pedalling at constant cadence
#[derive(Debug, Clone, PartialEq)]
pub struct CrankSimulation {
    cadence_rpm: f64,
    gear_ratio: f64,
    elapsed_s: f64,
}

impl CrankSimulation {
    pub fn new(cadence_rpm: f64, gear_ratio: f64) -> Self {
        Self {
            cadence_rpm,
            gear_ratio,
            elapsed_s: 0.0,
        }
    }

    /// Frame describing the crank state after `step` more of simulated time
    pub fn advance(&mut self, step: Duration) -> RawNotification {
        self.elapsed_s += step.as_secs_f64();

        let (revolutions, last_event_s) = if self.cadence_rpm > 0.0 {
            let period_s = 60.0 / self.cadence_rpm;
            let revolutions = (self.elapsed_s / period_s).floor();
            (revolutions as u64, revolutions * period_s)
        } else {
            (0, 0.0)
        };
        let event_time = ((last_event_s * 1024.0) as u64 % 65536) as u16;
        let wheel_revolutions = (revolutions as f64 * self.gear_ratio) as u64;

        CscMeasurement {
            flags: FLAG_WHEEL_DATA | FLAG_CRANK_DATA,
            wheel: Some(WheelData {
                cumulative_revolutions: (wheel_revolutions % (u64::from(u32::MAX) + 1)) as u32,
                last_event_time: event_time,
            }),
            crank: Some(CrankData {
                cumulative_revolutions: (revolutions % 65536) as u16,
                last_event_time: event_time,
            }),
        }
        .to_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedSensorLink {
    cadence_rpm: f64,
    gear_ratio: f64,
    notification_interval: Duration,
    shutdown: CancellationToken,
}

impl SimulatedSensorLink {
    /// The feed stops when its receiver is dropped or `shutdown` fires
    pub fn new(
        cadence_rpm: f64,
        gear_ratio: f64,
        notification_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cadence_rpm,
            gear_ratio,
            notification_interval,
            shutdown,
        }
    }
}

#[async_trait]
impl SensorLink for SimulatedSensorLink {
    async fn discover(
        &self,
        name_filter: &str,
        scan_timeout: Duration,
    ) -> Result<Option<SensorDevice>> {
        if DEVICE_NAME.contains(name_filter) {
            return Ok(Some(SensorDevice {
                name: DEVICE_NAME.to_string(),
                address: "00:00:00:00:00:00".to_string(),
            }));
        }
        tokio::time::sleep(scan_timeout).await;
        Ok(None)
    }

    async fn subscribe(
        &self,
        device: &SensorDevice,
        characteristic_uuid: &str,
    ) -> Result<mpsc::Receiver<RawNotification>> {
        tracing::info!(
            "Simulating {} on {} at {:.1} RPM",
            characteristic_uuid,
            device.name,
            self.cadence_rpm
        );

        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
        let mut simulation = CrankSimulation::new(self.cadence_rpm, self.gear_ratio);
        let step = self.notification_interval;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(step);
            let mut frame = simulation.advance(Duration::ZERO);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Simulated sensor feed stopped by shutdown");
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                if tx.send(frame).await.is_err() {
                    tracing::debug!("Simulated sensor feed closed");
                    break;
                }
                frame = simulation.advance(step);
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::frame_decoder::decode;
    use crate::domain::cadence::DecodeState;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    #[test]
    fn test_simulation_frame_layout() {
        let mut simulation = CrankSimulation::new(60.0, 3.0);
        simulation.advance(Duration::from_secs(1));
        let raw = simulation.advance(Duration::from_millis(1500));
        let frame = CscMeasurement::parse(&raw).unwrap();

        assert_eq!(frame.flags, FLAG_WHEEL_DATA | FLAG_CRANK_DATA);
        let crank = frame.require_crank().unwrap();
        assert_eq!(crank.cumulative_revolutions, 2);
        assert_eq!(crank.last_event_time, 2048);
        assert_eq!(frame.wheel.map(|w| w.cumulative_revolutions), Some(6));
    }

    #[test]
    fn test_stationary_simulation_repeats_event_time() {
        let mut simulation = CrankSimulation::new(0.0, 3.0);
        let first = simulation.advance(Duration::from_secs(1));
        let second = simulation.advance(Duration::from_secs(1));
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_decodes_to_configured_cadence() {
        let link = SimulatedSensorLink::new(
            90.0,
            3.0,
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        let device = link
            .discover("CAD", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let mut rx = link.subscribe(&device, "2a5b").await.unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let mut state = DecodeState::new(t0);
        let mut cadence = 0.0;
        for second in 0..5 {
            let raw = rx.recv().await.unwrap();
            let now = t0 + ChronoDuration::seconds(second);
            cadence = decode(&raw, &mut state, now).unwrap().cadence_rpm;
        }

        assert!((cadence - 90.0).abs() < 1.0, "cadence was {}", cadence);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_filters_by_name() {
        let link = SimulatedSensorLink::new(
            90.0,
            3.0,
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        let found = link.discover("POWER", Duration::from_secs(2)).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_closes_on_shutdown() {
        let shutdown = CancellationToken::new();
        let link = SimulatedSensorLink::new(60.0, 3.0, Duration::from_secs(1), shutdown.clone());
        let device = link
            .discover("CAD", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let mut rx = link.subscribe(&device, "2a5b").await.unwrap();

        assert!(rx.recv().await.is_some());
        shutdown.cancel();
        while rx.recv().await.is_some() {}
    }
}
