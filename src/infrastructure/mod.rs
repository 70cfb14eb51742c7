// Infrastructure layer - Configuration, sensor link and file output adapters
pub mod config;
pub mod csv_logger;
pub mod simulated_sensor;
