use crate::application::pipeline::PipelineSettings;
use crate::application::sensor_link::ScanPolicy;
use crate::application::session_processor::RideGeometry;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Standard CSC Measurement characteristic
pub const CSC_MEASUREMENT_UUID: &str = "00002a5b-0000-1000-8000-00805f9b34fb";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub cadence_uuid: String,
    pub sensor_name_filter: String,
    /// Metres
    pub wheel_circumference: f64,
    pub chainring: u32,
    pub cog: u32,
    pub terminal_width: usize,
    /// km/h, top of the plot
    pub max_speed: u32,
    /// km/h per plot row
    pub speed_interval: u32,
    /// Seconds
    pub scan_retry_duration: u64,
    /// Seconds
    pub scan_interval: u64,
    pub workout_dir: PathBuf,
    pub simulated_cadence_rpm: f64,
    pub notification_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cadence_uuid: CSC_MEASUREMENT_UUID.to_string(),
            sensor_name_filter: "CAD".to_string(),
            wheel_circumference: 2.1,
            chainring: 50,
            cog: 15,
            terminal_width: 60,
            max_speed: 60,
            speed_interval: 5,
            scan_retry_duration: 60,
            scan_interval: 5,
            workout_dir: PathBuf::from("workouts"),
            simulated_cadence_rpm: 85.0,
            notification_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("wheel_circumference must be a positive number of metres, got {0}")]
    InvalidCircumference(f64),

    #[error("max_speed ({max_speed}) must be at least speed_interval ({speed_interval})")]
    PlotTooShort { max_speed: u32, speed_interval: u32 },

    #[error("simulated_cadence_rpm must be a non-negative number, got {0}")]
    InvalidSimulatedCadence(f64),
}

impl AppConfig {
    pub fn gear_ratio(&self) -> f64 {
        f64::from(self.chainring) / f64::from(self.cog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("chainring", u64::from(self.chainring)),
            ("cog", u64::from(self.cog)),
            ("terminal_width", self.terminal_width as u64),
            ("speed_interval", u64::from(self.speed_interval)),
            ("scan_interval", self.scan_interval),
            ("notification_interval_ms", self.notification_interval_ms),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        if !self.wheel_circumference.is_finite() || self.wheel_circumference <= 0.0 {
            return Err(ConfigError::InvalidCircumference(self.wheel_circumference));
        }
        if self.max_speed < self.speed_interval {
            return Err(ConfigError::PlotTooShort {
                max_speed: self.max_speed,
                speed_interval: self.speed_interval,
            });
        }
        if !self.simulated_cadence_rpm.is_finite() || self.simulated_cadence_rpm < 0.0 {
            return Err(ConfigError::InvalidSimulatedCadence(self.simulated_cadence_rpm));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            characteristic_uuid: self.cadence_uuid.clone(),
            sensor_name_filter: self.sensor_name_filter.clone(),
            scan: ScanPolicy {
                retry_duration: Duration::from_secs(self.scan_retry_duration),
                scan_interval: Duration::from_secs(self.scan_interval),
            },
            geometry: RideGeometry {
                gear_ratio: self.gear_ratio(),
                wheel_circumference_m: self.wheel_circumference,
            },
            history_capacity: self.terminal_width,
        }
    }
}

/// Layered load: defaults, then `config/cadence.*`, then `CADENCE_*` env vars
pub fn load_config() -> anyhow::Result<AppConfig> {
    load_config_from("config/cadence")
}

pub fn load_config_from(path: &str) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("CADENCE"))
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}
