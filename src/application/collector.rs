// Collector trait and the polling loop that drives it
use crate::application::telemetry_repository::TimeSeriesRepository;
use crate::domain::telemetry::Point;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const INITIAL_DELAY: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// A data source polled on a fixed interval.
#[async_trait]
pub trait Collector: Send {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// Bucket the collected points are written to
    fn bucket(&self) -> &str;

    /// Fetch new samples. An empty batch means there was nothing to record.
    async fn collect(&mut self) -> anyhow::Result<Vec<Point>>;

    /// Called once the last collected batch is stored. State that must only
    /// advance after a successful write is committed here.
    fn on_written(&mut self) {}
}

/// Delay after the `consecutive_errors`-th failure in a row: the interval
/// doubled per failure, capped at five minutes.
pub fn backoff_delay(interval: Duration, consecutive_errors: u32) -> Duration {
    let exponent = consecutive_errors.saturating_sub(1);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    interval.saturating_mul(factor).min(MAX_BACKOFF)
}

pub struct CollectorRunner<C> {
    collector: C,
    repository: Arc<dyn TimeSeriesRepository>,
    consecutive_errors: u32,
}

impl<C: Collector> CollectorRunner<C> {
    pub fn new(collector: C, repository: Arc<dyn TimeSeriesRepository>) -> Self {
        Self {
            collector,
            repository,
            consecutive_errors: 0,
        }
    }

    pub async fn run_forever(mut self) {
        let name = self.collector.name();
        let interval = self.collector.interval();
        tracing::info!(collector = name, interval_sec = interval.as_secs(), "collector.start");

        tokio::time::sleep(INITIAL_DELAY).await;
        loop {
            let delay = self.tick().await;
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one collection and return how long to wait before the next one.
    pub async fn tick(&mut self) -> Duration {
        let name = self.collector.name();
        match self.collect_and_write().await {
            Ok(()) => {
                self.consecutive_errors = 0;
                self.collector.interval()
            }
            Err(e) => {
                self.consecutive_errors += 1;
                let backoff = backoff_delay(self.collector.interval(), self.consecutive_errors);
                tracing::error!(
                    collector = name,
                    consecutive_errors = self.consecutive_errors,
                    backoff_sec = backoff.as_secs(),
                    error = %format!("{e:#}"),
                    "collector.error"
                );
                backoff
            }
        }
    }

    async fn collect_and_write(&mut self) -> anyhow::Result<()> {
        let points = self.collector.collect().await?;
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let bucket = self.collector.bucket().to_string();
        self.repository.write_points(&bucket, points).await?;
        self.collector.on_written();
        tracing::info!(
            collector = self.collector.name(),
            bucket = %bucket,
            points = count,
            "collector.write"
        );
        Ok(())
    }
}
