// Solcast collector - Rooftop PV production forecasts
use crate::application::collector::Collector;
use crate::domain::telemetry::Point;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Deserialize;
use std::time::Duration;

pub const SOLCAST_BASE_URL: &str = "https://api.solcast.com.au";

/// UTC hours at which the API is actually called. Five slots for two sites
/// stays within the free tier's ten calls per day.
const FETCH_HOURS_UTC: [u32; 5] = [5, 9, 13, 17, 21];
const DAILY_CALL_LIMIT: u32 = 10;
const FORECAST_HOURS: u32 = 48;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecasts: Vec<Forecast>,
}

/// Estimates are in kW.
#[derive(Debug, Deserialize)]
struct Forecast {
    period_end: DateTime<Utc>,
    #[serde(default)]
    pv_estimate: f64,
    #[serde(default)]
    pv_estimate10: f64,
    #[serde(default)]
    pv_estimate90: f64,
}

pub struct SolcastCollector {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// (label, resource id) per rooftop
    sites: Vec<(&'static str, String)>,
    bucket: String,
    last_fetch_hour: Option<u32>,
    /// Slot of the batch awaiting a successful write
    pending_fetch_hour: Option<u32>,
    daily_calls: u32,
    daily_calls_date: Option<NaiveDate>,
}

impl SolcastCollector {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        site_se: String,
        site_sw: String,
        bucket: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Solcast HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            sites: vec![("se", site_se), ("sw", site_sw)],
            bucket,
            last_fetch_hour: None,
            pending_fetch_hour: None,
            daily_calls: 0,
            daily_calls_date: None,
        })
    }

    fn reset_daily_counter_if_needed(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.daily_calls_date != Some(today) {
            self.daily_calls = 0;
            self.daily_calls_date = Some(today);
            tracing::info!(date = %today, "solcast.daily_counter_reset");
        }
    }

    /// Only at scheduled hours, once per hour slot, within the daily budget.
    fn should_fetch(&mut self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        if !FETCH_HOURS_UTC.contains(&hour) || self.last_fetch_hour == Some(hour) {
            return false;
        }

        self.reset_daily_counter_if_needed(now);
        if self.daily_calls >= DAILY_CALL_LIMIT {
            tracing::warn!(calls = self.daily_calls, "solcast.daily_limit_reached");
            return false;
        }
        true
    }

    async fn fetch_site(&self, label: &'static str, site_id: &str) -> Result<Vec<Point>> {
        let response: ForecastResponse = self
            .http
            .get(format!("{}/rooftop_sites/{}/forecasts", self.base_url, site_id))
            .query(&[("format", "json".to_string()), ("hours", FORECAST_HOURS.to_string())])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send request to Solcast")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Solcast forecast")?;

        Ok(response
            .forecasts
            .iter()
            .map(|fc| {
                Point::new("pv_forecast", fc.period_end)
                    .tag("source", "solcast")
                    .tag("site", label)
                    .float("pv_estimate_w", fc.pv_estimate * 1000.0)
                    .float("pv_estimate10_w", fc.pv_estimate10 * 1000.0)
                    .float("pv_estimate90_w", fc.pv_estimate90 * 1000.0)
            })
            .collect())
    }

    async fn collect_at(&mut self, now: DateTime<Utc>) -> Result<Vec<Point>> {
        if !self.should_fetch(now) {
            tracing::debug!(reason = "not_scheduled_hour", "solcast.skip");
            return Ok(Vec::new());
        }

        let mut points = Vec::new();
        for (label, site_id) in self.sites.clone() {
            match self.fetch_site(label, &site_id).await {
                Ok(site_points) => {
                    self.daily_calls += 1;
                    tracing::info!(
                        site = label,
                        site_id = %site_id,
                        forecasts = site_points.len(),
                        daily_calls = self.daily_calls,
                        "solcast.site_fetched"
                    );
                    points.extend(site_points);
                }
                Err(e) => {
                    tracing::error!(site = label, error = %format!("{e:#}"), "solcast.site_error");
                }
            }
        }

        self.pending_fetch_hour = (!points.is_empty()).then_some(now.hour());
        Ok(points)
    }
}

#[async_trait]
impl Collector for SolcastCollector {
    fn name(&self) -> &'static str {
        "solcast"
    }

    /// Checked every 15 minutes; the schedule decides whether to call the API.
    fn interval(&self) -> Duration {
        Duration::from_secs(900)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn collect(&mut self) -> Result<Vec<Point>> {
        self.collect_at(Utc::now()).await
    }

    fn on_written(&mut self) {
        if let Some(hour) = self.pending_fetch_hour.take() {
            self.last_fetch_hour = Some(hour);
        }
    }
}
