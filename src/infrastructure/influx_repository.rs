// InfluxDB repository implementation
use crate::application::telemetry_repository::TimeSeriesRepository;
use crate::domain::telemetry::{FieldValue, Point, TimeSeriesPoint};
use anyhow::{Context, Result};
use async_trait::async_trait;
use influxdb2::models::{DataPoint, Query};
use influxdb2_structmap::value::Value;
use influxdb2_structmap::GenericMap;

pub struct InfluxRepository {
    client: influxdb2::Client,
}

impl InfluxRepository {
    pub fn new(host: String, token: String, org: String) -> Self {
        let host = host.trim_end_matches('/').to_string();
        Self {
            client: influxdb2::Client::new(host, org, token),
        }
    }

    /// True once the server reports it is ready to accept requests.
    pub async fn ping(&self) -> Result<bool> {
        self.client
            .ready()
            .await
            .context("Failed to reach InfluxDB readiness endpoint")
    }

    /// Column values of every record in the annotated CSV response.
    async fn execute_query(&self, flux: &str) -> Result<Vec<GenericMap>> {
        tracing::debug!("Executing Flux query: {}", flux);

        let records = self
            .client
            .query_raw(Some(Query::new(flux.to_string())))
            .await
            .context("InfluxDB query failed")?;

        Ok(records.into_iter().map(|record| record.values).collect())
    }
}

#[async_trait]
impl TimeSeriesRepository for InfluxRepository {
    async fn write_points(&self, bucket: &str, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let data_points = points
            .iter()
            .map(to_data_point)
            .collect::<Result<Vec<_>>>()?;

        self.client
            .write(bucket, futures::stream::iter(data_points))
            .await
            .with_context(|| format!("Failed to write {} points to bucket {}", points.len(), bucket))
    }

    async fn query_last_value(&self, flux: &str) -> Result<Option<f64>> {
        let records = self.execute_query(flux).await?;
        Ok(records.iter().find_map(|values| values.get("_value").and_then(as_f64)))
    }

    async fn query_time_series(&self, flux: &str) -> Result<Vec<TimeSeriesPoint>> {
        let records = self.execute_query(flux).await?;
        Ok(records_to_time_series(&records))
    }
}

fn to_data_point(point: &Point) -> Result<DataPoint> {
    let mut builder = DataPoint::builder(point.measurement.as_str());
    for (key, value) in &point.tags {
        builder = builder.tag(key.as_str(), value.as_str());
    }
    for (key, value) in &point.fields {
        builder = match value {
            FieldValue::Float(v) => builder.field(key.as_str(), *v),
            FieldValue::Text(v) => builder.field(key.as_str(), v.clone()),
        };
    }

    let timestamp = point
        .time
        .timestamp_nanos_opt()
        .context("Point timestamp out of range")?;

    builder
        .timestamp(timestamp)
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid data point {}: {}", point.measurement, e))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Double(v) => Some(v.into_inner()),
        Value::Long(v) => Some(*v as f64),
        Value::UnsignedLong(v) => Some(*v as f64),
        _ => None,
    }
}

/// Records without a timestamp or a numeric `_value` are skipped.
fn records_to_time_series(records: &[GenericMap]) -> Vec<TimeSeriesPoint> {
    records
        .iter()
        .filter_map(|values| {
            let time = match values.get("_time")? {
                Value::TimeRFC(time) => time.timestamp_millis(),
                _ => return None,
            };
            let value = as_f64(values.get("_value")?)?;
            Some(TimeSeriesPoint::new(time, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use influxdb2::models::WriteDataPoint;

    const FORECAST_CSV: &str = "\
#datatype,string,long,dateTime:RFC3339,double,string,string\r
#group,false,false,false,false,true,true\r
#default,_result,,,,,\r
,result,table,_time,_value,period,note\r
,,0,2025-01-02T00:00:00Z,21.5,today,\"first line\r
second line\"\r
,,0,2025-01-02T01:00:00Z,19.25,today,\"a, quoted \"\"note\"\"\"\r
\r
";

    fn record(time: Option<&str>, value: Value) -> GenericMap {
        let mut values = GenericMap::new();
        if let Some(time) = time {
            let time = chrono::DateTime::parse_from_rfc3339(time).unwrap();
            values.insert("_time".to_string(), Value::TimeRFC(time));
        }
        values.insert("_value".to_string(), value);
        values
    }

    async fn repository_with_body(body: &str) -> (mockito::ServerGuard, mockito::Mock, InfluxRepository) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(mockito::Matcher::UrlEncoded("org".into(), "my home".into()))
            .match_header("authorization", "Token secret")
            .with_status(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_body(body)
            .create_async()
            .await;
        let repository =
            InfluxRepository::new(server.url(), "secret".to_string(), "my home".to_string());
        (server, mock, repository)
    }

    #[tokio::test]
    async fn test_query_time_series_multiline_strings() {
        let (_server, mock, repository) = repository_with_body(FORECAST_CSV).await;

        let series = repository.query_time_series("from(bucket: \"energy\")").await.unwrap();
        mock.assert_async().await;

        assert_eq!(series.len(), 2);
        let first = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(series[0].time_ms, first.timestamp_millis());
        assert_eq!(series[0].value, 21.5);
        assert_eq!(series[1].value, 19.25);
    }

    #[tokio::test]
    async fn test_query_last_value() {
        let (_server, _mock, repository) = repository_with_body(FORECAST_CSV).await;
        let value = repository.query_last_value("from(bucket: \"energy\")").await.unwrap();
        assert_eq!(value, Some(21.5));
    }

    #[tokio::test]
    async fn test_query_http_error_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/query")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"code":"unauthorized","message":"unauthorized access"}"#)
            .create_async()
            .await;

        let repository = InfluxRepository::new(server.url(), "wrong".to_string(), "ems".to_string());
        assert!(repository.query_last_value("buckets()").await.is_err());
    }

    #[test]
    fn test_records_to_time_series_skips_incomplete() {
        let records = vec![
            record(Some("2025-01-02T00:00:00Z"), Value::Double(21.5.into())),
            record(None, Value::Double(18.0.into())),
            record(Some("2025-01-02T01:00:00Z"), Value::String("n/a".to_string())),
            record(Some("2025-01-02T02:00:00Z"), Value::Long(17)),
        ];

        let series = records_to_time_series(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value, 21.5);
        assert_eq!(series[1].value, 17.0);
    }

    #[test]
    fn test_to_data_point_line_protocol() {
        let time = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let point = Point::new("battery", time)
            .tag("source", "sonnen")
            .float("soc", 81.5)
            .text("battery_activity", "idle");

        let mut line = Vec::new();
        to_data_point(&point)
            .unwrap()
            .write_data_point_to(&mut line)
            .unwrap();
        let line = String::from_utf8(line).unwrap();

        assert!(line.starts_with("battery,source=sonnen "), "{line}");
        assert!(line.contains("soc=81.5"), "{line}");
        assert!(line.contains("battery_activity=\"idle\""), "{line}");
        assert!(line.trim_end().ends_with(&time.timestamp_nanos_opt().unwrap().to_string()));
    }
}
