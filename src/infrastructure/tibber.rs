// Tibber collector - Electricity prices from the Tibber GraphQL API
use crate::application::collector::Collector;
use crate::domain::telemetry::Point;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

pub const TIBBER_API_URL: &str = "https://api.tibber.com/v1-beta/gql";

const PRICE_QUERY: &str = r#"
{
  viewer {
    homes {
      currentSubscription {
        priceInfo {
          current { total energy tax startsAt level }
          today { total energy tax startsAt level }
          tomorrow { total energy tax startsAt level }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ViewerData>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    homes: Vec<Home>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Home {
    current_subscription: Option<Subscription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    price_info: PriceInfo,
}

#[derive(Debug, Deserialize)]
struct PriceInfo {
    current: Option<Price>,
    #[serde(default)]
    today: Option<Vec<Price>>,
    #[serde(default)]
    tomorrow: Option<Vec<Price>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Price {
    total: f64,
    energy: f64,
    tax: f64,
    starts_at: String,
    level: Option<String>,
}

impl Price {
    fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("NORMAL")
    }
}

pub struct TibberCollector {
    http: reqwest::Client,
    api_url: String,
    token: String,
    bucket: String,
    last_forecast_hash: Option<u64>,
    pending_forecast_hash: Option<u64>,
}

impl TibberCollector {
    pub fn new(api_url: impl Into<String>, token: String, bucket: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Tibber HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            token,
            bucket,
            last_forecast_hash: None,
            pending_forecast_hash: None,
        })
    }

    async fn fetch_price_info(&self) -> Result<PriceInfo> {
        let response: GraphQlResponse = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "query": PRICE_QUERY }))
            .send()
            .await
            .context("Failed to send request to Tibber")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse Tibber response")?;

        if let Some(errors) = response.errors {
            anyhow::bail!("Tibber GraphQL errors: {}", errors);
        }

        let home = response
            .data
            .context("Tibber response has no data")?
            .viewer
            .homes
            .into_iter()
            .next()
            .context("No homes found in Tibber account")?;

        Ok(home
            .current_subscription
            .context("Tibber home has no active subscription")?
            .price_info)
    }

    /// Current price always; today/tomorrow forecast only when it changed
    /// since the last stored batch.
    fn price_points(&mut self, info: &PriceInfo, now: DateTime<Utc>) -> Result<Vec<Point>> {
        let mut points = Vec::new();
        self.pending_forecast_hash = None;

        if let Some(current) = &info.current {
            points.push(
                Point::new("electricity_price", now)
                    .tag("source", "tibber")
                    .tag("level", current.level())
                    .float("total", current.total)
                    .float("energy", current.energy)
                    .float("tax", current.tax),
            );
            tracing::info!(total = current.total, level = current.level(), "tibber.current_price");
        }

        let today = info.today.as_deref().unwrap_or_default();
        let tomorrow = info.tomorrow.as_deref().unwrap_or_default();

        let hash = forecast_hash(today.iter().chain(tomorrow));
        if self.last_forecast_hash == Some(hash) {
            return Ok(points);
        }

        for (period, prices) in [("today", today), ("tomorrow", tomorrow)] {
            for price in prices {
                let starts_at = DateTime::parse_from_rfc3339(&price.starts_at)
                    .with_context(|| format!("Invalid startsAt {:?}", price.starts_at))?;
                points.push(
                    Point::new("electricity_price_forecast", starts_at.with_timezone(&Utc))
                        .tag("source", "tibber")
                        .tag("period", period)
                        .tag("level", price.level())
                        .float("total", price.total)
                        .float("energy", price.energy)
                        .float("tax", price.tax),
                );
            }
        }

        self.pending_forecast_hash = Some(hash);
        tracing::info!(
            today_hours = today.len(),
            tomorrow_hours = tomorrow.len(),
            "tibber.forecast_updated"
        );
        Ok(points)
    }
}

fn forecast_hash<'a>(prices: impl Iterator<Item = &'a Price>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for price in prices {
        price.total.to_bits().hash(&mut hasher);
        price.starts_at.hash(&mut hasher);
    }
    hasher.finish()
}

#[async_trait]
impl Collector for TibberCollector {
    fn name(&self) -> &'static str {
        "tibber"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(300)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn collect(&mut self) -> Result<Vec<Point>> {
        let info = self.fetch_price_info().await?;
        self.price_points(&info, Utc::now())
    }

    fn on_written(&mut self) {
        if let Some(hash) = self.pending_forecast_hash.take() {
            self.last_forecast_hash = Some(hash);
        }
    }
}
