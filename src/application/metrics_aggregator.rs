// Metrics aggregator - Integrates cadence samples into ride metrics
use crate::domain::cadence::{seconds_between, CadenceSample, Timestamp};
use crate::domain::metrics::{IntervalRecord, MetricsSnapshot, MetricsState};

/// Length of one interval-average window
pub const INTERVAL_WINDOW_S: f64 = 30.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Speed in km/h for a distance covered over `elapsed_s`, 0 when no time has passed
fn speed_kmh(distance_km: f64, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 {
        distance_km / (elapsed_s / SECONDS_PER_HOUR)
    } else {
        0.0
    }
}

/// Fold one sample into `state` and return the resulting snapshot
pub fn update(
    sample: CadenceSample,
    now: Timestamp,
    gear_ratio: f64,
    wheel_circumference_m: f64,
    state: &mut MetricsState,
) -> MetricsSnapshot {
    let (Some(last_revolutions), Some(last_sample_time)) =
        (state.last_revolutions, state.last_sample_time)
    else {
        state.last_revolutions = Some(sample.cumulative_revolutions);
        state.last_sample_time = Some(now);
        state.interval_start_time = Some(now);
        return MetricsSnapshot::default();
    };

    let revolutions_diff = sample.cumulative_revolutions.wrapping_sub(last_revolutions);
    let distance_increment_km =
        f64::from(revolutions_diff) * gear_ratio * wheel_circumference_m / 1000.0;
    state.total_distance_km += distance_increment_km;
    state.interval_distance_km += distance_increment_km;

    let moving = sample.cadence_rpm > 0.0;
    let live_speed_kmh = if moving {
        (sample.cadence_rpm / 60.0) * gear_ratio * wheel_circumference_m * 3.6
    } else {
        0.0
    };
    if moving {
        state.active_time_s += seconds_between(last_sample_time, now);
    }
    state.live_speed_history.push(live_speed_kmh);

    let average_speed_kmh = speed_kmh(state.total_distance_km, state.active_time_s);

    let interval_start = state.interval_start_time.unwrap_or(last_sample_time);
    let interval_elapsed_s = seconds_between(interval_start, now);
    let mut interval_speed_kmh = 0.0;
    if interval_elapsed_s >= INTERVAL_WINDOW_S {
        interval_speed_kmh = speed_kmh(state.interval_distance_km, interval_elapsed_s);
        state.interval_history.push(IntervalRecord {
            avg_speed_kmh: interval_speed_kmh,
            distance_km: state.interval_distance_km,
        });
        tracing::debug!(
            "Interval closed: {:.2} km/h over {:.3} km",
            interval_speed_kmh,
            state.interval_distance_km
        );
        state.interval_start_time = Some(now);
        state.interval_distance_km = 0.0;
    }

    state.last_revolutions = Some(sample.cumulative_revolutions);
    state.last_sample_time = Some(now);

    MetricsSnapshot {
        live_rpm: sample.cadence_rpm,
        live_speed_kmh,
        interval_speed_kmh,
        average_speed_kmh,
        total_distance_km: state.total_distance_km,
        live_speed_history: state.live_speed_history.to_vec(),
        interval_history: state.interval_history.to_vec(),
        active_time_s: state.active_time_s,
    }
}
