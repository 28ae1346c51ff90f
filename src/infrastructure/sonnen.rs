// Sonnen collector - Battery status from the sonnenBatterie local API
use crate::application::collector::Collector;
use crate::domain::battery::BatteryStatus;
use crate::domain::bucket::TELEMETRY_BUCKET;
use crate::domain::telemetry::Point;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub struct SonnenCollector {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SonnenCollector {
    pub fn new(ip: &str, token: String) -> Result<Self> {
        Self::with_base_url(format!("http://{}/api/v2", ip), token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Sonnen HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn fetch_status(&self) -> Result<BatteryStatus> {
        self.http
            .get(format!("{}/status", self.base_url))
            .header("Auth-Token", self.token.as_str())
            .send()
            .await
            .context("Failed to send request to Sonnen battery")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Sonnen status")
    }
}

fn battery_point(status: &BatteryStatus, now: DateTime<Utc>) -> Point {
    Point::new("battery", now)
        .tag("source", "sonnen")
        .float("soc", status.soc)
        .float("production_w", status.production_w)
        .float("consumption_w", status.consumption_w)
        .float("grid_feed_in_w", status.grid_feed_in_w)
        .float("grid_purchase_w", status.grid_purchase_w)
        .float("pac_total_w", status.pac_total_w)
        .float("battery_charging_w", status.charging_w())
        .float("battery_discharging_w", status.discharging_w())
        .text("system_status", status.system_status.clone())
        .text("battery_activity", status.activity().as_str())
}

#[async_trait]
impl Collector for SonnenCollector {
    fn name(&self) -> &'static str {
        "sonnen"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn bucket(&self) -> &str {
        TELEMETRY_BUCKET
    }

    async fn collect(&mut self) -> Result<Vec<Point>> {
        let status = self.fetch_status().await?;
        tracing::info!(
            soc = status.soc,
            production_w = status.production_w,
            consumption_w = status.consumption_w,
            pac_total_w = status.pac_total_w,
            activity = %status.activity(),
            "sonnen.collected"
        );
        Ok(vec![battery_point(&status, Utc::now())])
    }
}
