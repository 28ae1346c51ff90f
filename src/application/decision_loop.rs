// Decision loop - Periodically turns electricity prices into a battery mode
use crate::application::telemetry_repository::TimeSeriesRepository;
use crate::domain::bucket::DECISIONS_BUCKET;
use crate::domain::decision::{decide, DecisionResult};
use crate::domain::telemetry::Point;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct DecisionLoop {
    repository: Arc<dyn TimeSeriesRepository>,
    price_bucket: String,
    interval: Duration,
    tx: watch::Sender<DecisionResult>,
}

impl DecisionLoop {
    /// Returns the loop and a receiver that always holds the latest decision.
    pub fn new(
        repository: Arc<dyn TimeSeriesRepository>,
        price_bucket: String,
        interval: Duration,
    ) -> (Self, watch::Receiver<DecisionResult>) {
        let (tx, rx) = watch::channel(DecisionResult::default());
        let decision_loop = Self {
            repository,
            price_bucket,
            interval,
            tx,
        };
        (decision_loop, rx)
    }

    pub async fn run_forever(self) {
        tracing::info!(interval_sec = self.interval.as_secs(), "decision_loop.start");
        loop {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %format!("{e:#}"), "decision_loop.error");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn tick(&self) -> anyhow::Result<DecisionResult> {
        let now = Utc::now();
        tracing::info!(ts = %now.to_rfc3339(), "decision_loop.tick");

        let current_price = self
            .repository
            .query_last_value(&current_price_query(&self.price_bucket))
            .await?;
        let today_prices = self.fetch_today_forecast().await?;

        let result = decide(current_price, &today_prices);
        self.tx.send_replace(result.clone());
        tracing::info!(
            mode = %result.mode,
            target_w = result.target_w,
            reason = %result.reason,
            "decision_loop.result"
        );

        let point = Point::new("decision", now)
            .tag("mode", result.mode.as_str())
            .float("target_w", result.target_w as f64)
            .text("reason", result.reason.clone());
        self.repository
            .write_points(DECISIONS_BUCKET, vec![point])
            .await?;

        Ok(result)
    }

    /// Today's hourly prices, one per timestamp, in ascending order.
    async fn fetch_today_forecast(&self) -> anyhow::Result<Vec<f64>> {
        let series = self
            .repository
            .query_time_series(&today_forecast_query(&self.price_bucket))
            .await?;

        let by_time: BTreeMap<i64, f64> = series.into_iter().map(|p| (p.time_ms, p.value)).collect();
        let mut prices: Vec<f64> = by_time.into_values().collect();
        prices.sort_by(f64::total_cmp);
        Ok(prices)
    }
}

fn current_price_query(bucket: &str) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -6h)
  |> filter(fn: (r) => r._measurement == "electricity_price")
  |> filter(fn: (r) => r._field == "total")
  |> last()"#
    )
}

fn today_forecast_query(bucket: &str) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -36h, stop: 36h)
  |> filter(fn: (r) => r._measurement == "electricity_price_forecast")
  |> filter(fn: (r) => r._field == "total")
  |> filter(fn: (r) => r.period == "today")"#
    )
}
