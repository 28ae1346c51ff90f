// Repository trait for time-series data access
use crate::domain::telemetry::{Point, TimeSeriesPoint};
use async_trait::async_trait;

#[async_trait]
pub trait TimeSeriesRepository: Send + Sync {
    /// Write a batch of points to a bucket. Empty batches are a no-op.
    async fn write_points(&self, bucket: &str, points: Vec<Point>) -> anyhow::Result<()>;

    /// Run a Flux query and return the first non-null value
    async fn query_last_value(&self, flux: &str) -> anyhow::Result<Option<f64>>;

    /// Run a Flux query and return every (time, value) row
    async fn query_time_series(&self, flux: &str) -> anyhow::Result<Vec<TimeSeriesPoint>>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory repository that records writes and replays canned query results.
    #[derive(Default)]
    pub struct MemoryRepository {
        pub writes: Mutex<Vec<(String, Vec<Point>)>>,
        pub last_value: Mutex<Option<f64>>,
        pub series: Mutex<Vec<TimeSeriesPoint>>,
        pub queries: Mutex<Vec<String>>,
        pub fail_queries: bool,
        pub fail_writes: bool,
    }

    impl MemoryRepository {
        pub fn written(&self) -> Vec<(String, Vec<Point>)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TimeSeriesRepository for MemoryRepository {
        async fn write_points(&self, bucket: &str, points: Vec<Point>) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("write failed");
            }
            if !points.is_empty() {
                self.writes.lock().unwrap().push((bucket.to_string(), points));
            }
            Ok(())
        }

        async fn query_last_value(&self, flux: &str) -> anyhow::Result<Option<f64>> {
            self.queries.lock().unwrap().push(flux.to_string());
            if self.fail_queries {
                anyhow::bail!("query failed");
            }
            Ok(*self.last_value.lock().unwrap())
        }

        async fn query_time_series(&self, flux: &str) -> anyhow::Result<Vec<TimeSeriesPoint>> {
            self.queries.lock().unwrap().push(flux.to_string());
            if self.fail_queries {
                anyhow::bail!("query failed");
            }
            Ok(self.series.lock().unwrap().clone())
        }
    }
}
