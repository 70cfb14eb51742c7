// Frame decoder - CSC notification to cadence sample
use crate::domain::cadence::{seconds_between, CadenceSample, DecodeState, Timestamp};
use crate::domain::csc::{CscMeasurement, FrameError};

/// Crank event time resolution
const EVENT_TICKS_PER_SECOND: f64 = 1024.0;
/// Span of the 16-bit event time counter, in seconds
const EVENT_TIME_SPAN_S: f64 = 65536.0 / EVENT_TICKS_PER_SECOND;
/// Gap after which the crank is presumed stationary
pub const INACTIVITY_TIMEOUT_S: f64 = 10.0;

/// Decode one notification. On error `state` is left untouched.
pub fn decode(
    raw: &[u8],
    state: &mut DecodeState,
    now: Timestamp,
) -> Result<CadenceSample, FrameError> {
    let crank = CscMeasurement::parse(raw)?.require_crank()?;
    let raw_revolutions = crank.cumulative_revolutions;
    let event_time = crank.last_event_time;

    let Some(prev_event_time) = state.prev_event_time else {
        state.prev_event_time = Some(event_time);
        state.prev_raw_revolutions = raw_revolutions;
        state.prev_revolutions = u32::from(raw_revolutions);
        state.last_cadence = 0.0;
        state.last_movement_time = now;
        return Ok(CadenceSample::new(0.0, state.prev_revolutions));
    };

    let cumulative_revolutions = state.unwrap_revolutions(raw_revolutions);

    if event_time == prev_event_time {
        state.last_movement_time = now;
        return Ok(CadenceSample::new(state.last_cadence, cumulative_revolutions));
    }

    let mut dt = (f64::from(event_time) - f64::from(prev_event_time)) / EVENT_TICKS_PER_SECOND;
    if dt < 0.0 {
        dt += EVENT_TIME_SPAN_S;
    }
    tracing::debug!(
        "Crank time diff: {:.6}s, prev event: {}, last event: {}",
        dt,
        prev_event_time,
        event_time
    );

    let revolutions = cumulative_revolutions.wrapping_sub(state.prev_revolutions);
    let mut cadence = if dt > 0.0 {
        f64::from(revolutions) / dt * 60.0
    } else {
        state.last_cadence
    };

    let idle_s = seconds_between(state.last_movement_time, now);
    if idle_s > INACTIVITY_TIMEOUT_S {
        tracing::debug!("Cadence reset: {:.2}s since last movement", idle_s);
        cadence = 0.0;
    }

    state.prev_event_time = Some(event_time);
    state.prev_raw_revolutions = raw_revolutions;
    state.prev_revolutions = cumulative_revolutions;
    state.last_cadence = cadence;
    state.last_movement_time = now;

    Ok(CadenceSample::new(cadence, cumulative_revolutions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::csc::crank_frame;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
    }

    fn at(ms: i64) -> Timestamp {
        t0() + Duration::milliseconds(ms)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_sample_initializes_state() {
        let mut state = DecodeState::new(t0());
        let sample = decode(&crank_frame(42, 5000), &mut state, at(300)).unwrap();

        assert_eq!(sample, CadenceSample::new(0.0, 42));
        assert_eq!(state.prev_event_time, Some(5000));
        assert_eq!(state.prev_revolutions, 42);
        assert_eq!(state.last_movement_time, at(300));
    }

    #[test]
    fn test_cadence_from_event_delta() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(10, 0), &mut state, at(0)).unwrap();
        // 2 revolutions in 1.5 s
        let sample = decode(&crank_frame(12, 1536), &mut state, at(1500)).unwrap();

        assert!(approx(sample.cadence_rpm, 80.0));
        assert_eq!(sample.cumulative_revolutions, 12);
        assert!(approx(state.last_cadence, 80.0));
    }

    #[test]
    fn test_duplicate_event_retains_cadence() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(0, 0), &mut state, at(0)).unwrap();
        let first = decode(&crank_frame(1, 1024), &mut state, at(1000)).unwrap();
        let second = decode(&crank_frame(2, 1024), &mut state, at(2000)).unwrap();

        assert!(approx(first.cadence_rpm, 60.0));
        assert_eq!(second.cadence_rpm, first.cadence_rpm);
        assert_eq!(second.cumulative_revolutions, 2);
        assert_eq!(state.last_movement_time, at(2000));
        assert_eq!(state.prev_event_time, Some(1024));
    }

    #[test]
    fn test_event_time_rollover() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(7, 65000), &mut state, at(0)).unwrap();
        let sample = decode(&crank_frame(8, 100), &mut state, at(500)).unwrap();

        let dt = (100.0 - 65000.0 + 65536.0) / 1024.0;
        assert!(approx(sample.cadence_rpm, 1.0 / dt * 60.0));
        assert!(sample.cadence_rpm > 0.0);
    }

    #[test]
    fn test_revolution_counter_wrap() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(65535, 0), &mut state, at(0)).unwrap();
        let sample = decode(&crank_frame(1, 2048), &mut state, at(2000)).unwrap();

        assert_eq!(sample.cumulative_revolutions, 65537);
        assert!(approx(sample.cadence_rpm, 60.0));
    }

    #[test]
    fn test_inactivity_forces_zero_cadence() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(0, 0), &mut state, at(0)).unwrap();
        decode(&crank_frame(1, 1024), &mut state, at(1000)).unwrap();

        // next tick arrives after more than 10 s of silence
        let sample = decode(&crank_frame(3, 3072), &mut state, at(11_500)).unwrap();

        assert_eq!(sample.cadence_rpm, 0.0);
        assert_eq!(state.last_cadence, 0.0);
        assert_eq!(sample.cumulative_revolutions, 3);
    }

    #[test]
    fn test_steady_riding_does_not_time_out() {
        let mut state = DecodeState::new(t0());
        let mut last = CadenceSample::new(0.0, 0);
        for tick in 0..30u16 {
            let now = at(i64::from(tick) * 1000);
            last = decode(&crank_frame(tick, tick * 1024), &mut state, now).unwrap();
        }
        assert!(approx(last.cadence_rpm, 60.0));
    }

    #[test]
    fn test_malformed_frame_leaves_state_unchanged() {
        let mut state = DecodeState::new(t0());
        decode(&crank_frame(5, 100), &mut state, at(0)).unwrap();
        let before = state.clone();

        assert_eq!(decode(&[], &mut state, at(1000)), Err(FrameError::Empty));
        assert!(matches!(
            decode(&[0x02, 0x05], &mut state, at(1000)),
            Err(FrameError::Truncated { .. })
        ));
        assert_eq!(
            decode(&[0x00, 0x01, 0x02], &mut state, at(1000)),
            Err(FrameError::MissingCrankData { flags: 0x00 })
        );
        assert_eq!(state, before);
    }
}
