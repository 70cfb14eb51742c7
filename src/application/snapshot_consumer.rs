// Snapshot consumer trait - Display and logging sinks fed by the fan-out
use crate::domain::metrics::MetricsSnapshot;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;

/// Bounded wait on the input queue, so shutdown is observed while idle
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SnapshotConsumer: Send {
    fn name(&self) -> &'static str;

    async fn consume(&mut self, snapshot: &MetricsSnapshot) -> anyhow::Result<()>;

    /// Called when a poll times out with no snapshot
    async fn on_idle(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the stream ends or shutdown is requested
    async fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Drive a consumer until its queue closes or `shutdown` fires, then drain what is queued
pub async fn run_consumer(
    mut consumer: Box<dyn SnapshotConsumer>,
    mut rx: broadcast::Receiver<MetricsSnapshot>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let name = consumer.name();

    while !shutdown.is_cancelled() {
        match tokio::time::timeout(POLL_TIMEOUT, rx.recv()).await {
            Ok(Ok(snapshot)) => {
                if let Err(e) = consumer.consume(&snapshot).await {
                    tracing::error!("{} failed to consume snapshot: {:#}", name, e);
                }
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!("{} lagging, dropped {} oldest snapshots", name, skipped);
            }
            Ok(Err(RecvError::Closed)) => {
                tracing::debug!("{} input closed", name);
                break;
            }
            Err(_elapsed) => {
                if let Err(e) = consumer.on_idle().await {
                    tracing::error!("{} idle work failed: {:#}", name, e);
                }
            }
        }
    }

    // snapshots already queued when shutdown fired are still delivered
    loop {
        match rx.try_recv() {
            Ok(snapshot) => {
                if let Err(e) = consumer.consume(&snapshot).await {
                    tracing::error!("{} failed to consume snapshot: {:#}", name, e);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("{} lagging, dropped {} oldest snapshots", name, skipped);
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    tracing::info!("{} stopping", name);
    consumer.finish().await
}
