// Provisioning service - Ensures the deployment's buckets exist
use crate::application::bucket_admin::BucketAdmin;
use crate::domain::bucket::BucketSpec;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketOutcome {
    Created,
    /// Create call failed, either because the bucket exists or for any other reason.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub outcomes: Vec<(String, BucketOutcome)>,
}

impl ProvisionReport {
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == BucketOutcome::Created)
            .count()
    }
}

pub struct ProvisioningService<A> {
    admin: A,
    buckets: Vec<BucketSpec>,
}

impl<A: BucketAdmin> ProvisioningService<A> {
    pub fn new(admin: A, buckets: Vec<BucketSpec>) -> Self {
        Self { admin, buckets }
    }

    /// Create every bucket in order. A failed create never stops the run; it
    /// only prints a fallback notice for that bucket.
    pub async fn provision(
        &self,
        org: &str,
        token: &str,
        out: &mut impl Write,
    ) -> std::io::Result<ProvisionReport> {
        writeln!(out, "Creating InfluxDB buckets...")?;

        let mut outcomes = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            tracing::debug!(bucket = %bucket.name, retention = %bucket.retention, "provision.create");

            match self.admin.create_bucket(bucket, org, token).await {
                Ok(()) => {
                    tracing::info!(bucket = %bucket.name, retention = %bucket.retention, "provision.created");
                    outcomes.push((bucket.name.clone(), BucketOutcome::Created));
                }
                Err(e) => {
                    tracing::info!(bucket = %bucket.name, error = %e, "provision.create_failed");
                    writeln!(out, "Bucket '{}' already exists", bucket.name)?;
                    outcomes.push((bucket.name.clone(), BucketOutcome::Skipped));
                }
            }
        }

        writeln!(out, "InfluxDB buckets ready.")?;
        Ok(ProvisionReport { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bucket_admin::ProvisionError;
    use crate::domain::bucket::default_buckets;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TOKEN: &str = "admin-token";

    /// Fake database: creates unknown buckets, rejects duplicates and bad tokens.
    #[derive(Default)]
    struct FakeAdmin {
        buckets: Mutex<HashMap<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BucketAdmin for FakeAdmin {
        async fn create_bucket(
            &self,
            bucket: &BucketSpec,
            org: &str,
            token: &str,
        ) -> Result<(), ProvisionError> {
            self.calls.lock().unwrap().push(bucket.name.clone());

            let fail = |stderr: &str| ProvisionError::Exit {
                program: "influx".to_string(),
                status: "exit status: 1".to_string(),
                stderr: stderr.to_string(),
            };

            if token != TOKEN || org.is_empty() {
                return Err(fail("unauthorized access"));
            }
            let mut buckets = self.buckets.lock().unwrap();
            if buckets.contains_key(&bucket.name) {
                return Err(fail("bucket already exists"));
            }
            buckets.insert(bucket.name.clone(), bucket.retention.to_string());
            Ok(())
        }
    }

    async fn run(service: &ProvisioningService<FakeAdmin>, token: &str) -> (ProvisionReport, String) {
        let mut out = Vec::new();
        let report = service.provision("home", token, &mut out).await.unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_creates_both_buckets_with_retention() {
        let service = ProvisioningService::new(FakeAdmin::default(), default_buckets());
        let (report, output) = run(&service, TOKEN).await;

        assert_eq!(report.created(), 2);
        assert_eq!(output, "Creating InfluxDB buckets...\nInfluxDB buckets ready.\n");

        let buckets = service.admin.buckets.lock().unwrap();
        assert_eq!(buckets.get("decisions").map(String::as_str), Some("365d"));
        assert_eq!(buckets.get("telemetry").map(String::as_str), Some("90d"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let service = ProvisioningService::new(FakeAdmin::default(), default_buckets());
        run(&service, TOKEN).await;
        let after_first = service.admin.buckets.lock().unwrap().clone();

        let (report, output) = run(&service, TOKEN).await;
        assert_eq!(*service.admin.buckets.lock().unwrap(), after_first);
        assert_eq!(report.created(), 0);
        assert!(output.contains("Bucket 'decisions' already exists"));
        assert!(output.contains("Bucket 'telemetry' already exists"));
    }

    #[tokio::test]
    async fn test_bad_token_reports_fallback_for_each_bucket() {
        let service = ProvisioningService::new(FakeAdmin::default(), default_buckets());
        let (report, output) = run(&service, "").await;

        assert_eq!(
            report.outcomes,
            vec![
                ("decisions".to_string(), BucketOutcome::Skipped),
                ("telemetry".to_string(), BucketOutcome::Skipped),
            ]
        );
        assert_eq!(
            output,
            "Creating InfluxDB buckets...\n\
             Bucket 'decisions' already exists\n\
             Bucket 'telemetry' already exists\n\
             InfluxDB buckets ready.\n"
        );
        assert!(service.admin.buckets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_kept_when_first_call_fails() {
        let admin = FakeAdmin::default();
        admin
            .buckets
            .lock()
            .unwrap()
            .insert("decisions".to_string(), "365d".to_string());
        let service = ProvisioningService::new(admin, default_buckets());

        let (report, _) = run(&service, TOKEN).await;
        assert_eq!(*service.admin.calls.lock().unwrap(), vec!["decisions", "telemetry"]);
        assert_eq!(report.outcomes[1], ("telemetry".to_string(), BucketOutcome::Created));
    }
}
