// CSV workout logger - Batches snapshots into an append-only file
use crate::application::snapshot_consumer::SnapshotConsumer;
use crate::domain::metrics::MetricsSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

pub const BATCH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogRow {
    pub time: String,
    pub cadence: f64,
    pub speed: f64,
    pub distance: f64,
    pub average_speed: f64,
}

impl LogRow {
    fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            cadence: snapshot.live_rpm,
            speed: snapshot.live_speed_kmh,
            distance: snapshot.total_distance_km,
            average_speed: snapshot.average_speed_kmh,
        }
    }
}

/// `{dir}/workout_YYYY-MM-DD_HH-MM-SS.csv`, creating `dir` if needed
pub fn workout_file_path(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create workout directory {}", dir.display()))?;
    let name = format!("workout_{}.csv", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    Ok(dir.join(name))
}

/// Append rows, writing the header only into an empty file
pub fn append_rows(path: &Path, rows: &[LogRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let is_empty = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_empty)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub struct CsvLogger {
    path: PathBuf,
    batch: Vec<LogRow>,
    last_written: Instant,
    batch_interval: Duration,
}

impl CsvLogger {
    pub fn create(dir: &Path) -> Result<Self> {
        let path = workout_file_path(dir)?;
        tracing::info!("Logging workout to {}", path.display());
        Ok(Self::with_path(path, BATCH_INTERVAL))
    }

    pub fn with_path(path: PathBuf, batch_interval: Duration) -> Self {
        Self {
            path,
            batch: Vec::new(),
            last_written: Instant::now(),
            batch_interval,
        }
    }

    fn write_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        append_rows(&self.path, &self.batch)?;
        tracing::info!("Batch of {} rows written to {}", self.batch.len(), self.path.display());
        self.batch.clear();
        Ok(())
    }

    fn flush_if_due(&mut self) -> Result<()> {
        if self.last_written.elapsed() >= self.batch_interval {
            self.write_batch()?;
            self.last_written = Instant::now();
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotConsumer for CsvLogger {
    fn name(&self) -> &'static str {
        "csv-logger"
    }

    async fn consume(&mut self, snapshot: &MetricsSnapshot) -> Result<()> {
        self.batch.push(LogRow::from_snapshot(snapshot));
        self.flush_if_due()
    }

    async fn on_idle(&mut self) -> Result<()> {
        self.flush_if_due()
    }

    async fn finish(&mut self) -> Result<()> {
        self.write_batch()
    }
}
