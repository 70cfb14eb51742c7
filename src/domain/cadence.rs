// Cadence domain model
use chrono::{DateTime, Utc};

/// Wall-clock instant used by the decoder and the aggregator
pub type Timestamp = DateTime<Utc>;

/// Seconds elapsed from `earlier` to `later`, clamped at zero if the clock went backwards
pub fn seconds_between(earlier: Timestamp, later: Timestamp) -> f64 {
    let micros = (later - earlier).num_microseconds().unwrap_or(i64::MAX);
    (micros.max(0) as f64) / 1_000_000.0
}

/// One decoded crank observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceSample {
    pub cadence_rpm: f64,
    /// Crank revolutions since the session started counting, unwrapped from the 16-bit field
    pub cumulative_revolutions: u32,
}

impl CadenceSample {
    pub fn new(cadence_rpm: f64, cumulative_revolutions: u32) -> Self {
        Self {
            cadence_rpm,
            cumulative_revolutions,
        }
    }
}

/// Decoder bookkeeping carried from one notification to the next
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeState {
    /// Last crank event time in 1/1024 s; `None` until the first sample
    pub prev_event_time: Option<u16>,
    /// Unwrapped cumulative revolution count at `prev_event_time`
    pub prev_revolutions: u32,
    /// Raw 16-bit counter value at `prev_event_time`
    pub prev_raw_revolutions: u16,
    pub last_cadence: f64,
    pub last_movement_time: Timestamp,
}

impl DecodeState {
    pub fn new(now: Timestamp) -> Self {
        Self {
            prev_event_time: None,
            prev_revolutions: 0,
            prev_raw_revolutions: 0,
            last_cadence: 0.0,
            last_movement_time: now,
        }
    }

    /// Unwrapped revolution count for a raw counter reading taken after `prev_raw_revolutions`
    pub fn unwrap_revolutions(&self, raw: u16) -> u32 {
        let delta = raw.wrapping_sub(self.prev_raw_revolutions);
        self.prev_revolutions.wrapping_add(u32::from(delta))
    }
}
