// Ride metrics domain models
use super::cadence::Timestamp;
use std::collections::VecDeque;

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest entry
#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: Clone> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Average speed and distance over one completed 30 s window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRecord {
    pub avg_speed_kmh: f64,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsState {
    pub total_distance_km: f64,
    pub active_time_s: f64,
    pub last_revolutions: Option<u32>,
    pub last_sample_time: Option<Timestamp>,
    pub live_speed_history: History<f64>,
    pub interval_history: History<IntervalRecord>,
    pub interval_start_time: Option<Timestamp>,
    pub interval_distance_km: f64,
}

impl MetricsState {
    /// `history_capacity` is the display width
    pub fn new(history_capacity: usize) -> Self {
        Self {
            total_distance_km: 0.0,
            active_time_s: 0.0,
            last_revolutions: None,
            last_sample_time: None,
            live_speed_history: History::new(history_capacity),
            interval_history: History::new(history_capacity),
            interval_start_time: None,
            interval_distance_km: 0.0,
        }
    }
}

/// Immutable metrics view handed to display and logging
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub live_rpm: f64,
    pub live_speed_kmh: f64,
    pub interval_speed_kmh: f64,
    pub average_speed_kmh: f64,
    pub total_distance_km: f64,
    pub live_speed_history: Vec<f64>,
    pub interval_history: Vec<IntervalRecord>,
    pub active_time_s: f64,
}
