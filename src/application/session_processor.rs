// Session processor - Single owner of decode and metrics state
use crate::application::{frame_decoder, metrics_aggregator};
use crate::domain::cadence::{DecodeState, Timestamp};
use crate::domain::csc::FrameError;
use crate::domain::metrics::{MetricsSnapshot, MetricsState};

/// Bike setup feeding the speed and distance math
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RideGeometry {
    pub gear_ratio: f64,
    pub wheel_circumference_m: f64,
}

pub struct SessionProcessor {
    geometry: RideGeometry,
    decode_state: DecodeState,
    metrics_state: MetricsState,
}

impl SessionProcessor {
    pub fn new(geometry: RideGeometry, history_capacity: usize, started_at: Timestamp) -> Self {
        Self {
            geometry,
            decode_state: DecodeState::new(started_at),
            metrics_state: MetricsState::new(history_capacity),
        }
    }

    /// Decode one notification and aggregate it; a malformed frame changes nothing
    pub fn process(&mut self, raw: &[u8], now: Timestamp) -> Result<MetricsSnapshot, FrameError> {
        let sample = frame_decoder::decode(raw, &mut self.decode_state, now)?;
        Ok(metrics_aggregator::update(
            sample,
            now,
            self.geometry.gear_ratio,
            self.geometry.wheel_circumference_m,
            &mut self.metrics_state,
        ))
    }

    #[cfg(test)]
    pub fn metrics_state(&self) -> &MetricsState {
        &self.metrics_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::csc::crank_frame;
    use chrono::{Duration, TimeZone, Utc};

    fn at(ms: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn geometry() -> RideGeometry {
        RideGeometry {
            gear_ratio: 3.33,
            wheel_circumference_m: 2.1,
        }
    }

    #[test]
    fn test_sixty_one_second_ticks() {
        let mut processor = SessionProcessor::new(geometry(), 40, at(0));
        let mut previous_distance = 0.0;
        let mut last = MetricsSnapshot::default();

        for tick in 0..=60u16 {
            let now = at(i64::from(tick) * 1000);
            last = processor.process(&crank_frame(tick, tick * 1024), now).unwrap();
            if tick > 1 {
                assert!(last.total_distance_km > previous_distance);
            }
            previous_distance = last.total_distance_km;
        }

        assert!((last.live_rpm - 60.0).abs() < 1e-9);
        assert!((last.live_speed_kmh - 25.1748).abs() < 1e-3);
        assert!((last.total_distance_km - 60.0 * 3.33 * 2.1 / 1000.0).abs() < 1e-9);
        assert_eq!(last.live_speed_history.len(), 40);
        assert_eq!(last.interval_history.len(), 2);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut processor = SessionProcessor::new(geometry(), 10, at(0));
        processor.process(&crank_frame(0, 0), at(0)).unwrap();
        let before = processor.metrics_state().clone();

        assert!(processor.process(&[0x02, 0x01], at(1000)).is_err());
        assert_eq!(processor.metrics_state(), &before);
    }
}
