// Application layer - Decode/aggregate use cases and pipeline orchestration
pub mod frame_decoder;
pub mod metrics_aggregator;
pub mod pipeline;
pub mod sensor_link;
pub mod session_processor;
pub mod snapshot_consumer;
