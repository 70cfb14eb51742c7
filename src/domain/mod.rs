// Domain layer - Sensor frames, decode state and ride metrics
pub mod cadence;
pub mod csc;
pub mod metrics;
