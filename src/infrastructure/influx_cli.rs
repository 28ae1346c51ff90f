// Bucket administration through the `influx` command-line tool
use crate::application::bucket_admin::{BucketAdmin, ProvisionError};
use crate::domain::bucket::BucketSpec;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

pub struct InfluxCli {
    program: String,
}

impl InfluxCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn create_bucket_args(bucket: &BucketSpec, org: &str, token: &str) -> Vec<String> {
        vec![
            "bucket".to_string(),
            "create".to_string(),
            "--name".to_string(),
            bucket.name.clone(),
            "--org".to_string(),
            org.to_string(),
            "--retention".to_string(),
            bucket.retention.to_string(),
            "--token".to_string(),
            token.to_string(),
        ]
    }
}

#[async_trait]
impl BucketAdmin for InfluxCli {
    async fn create_bucket(
        &self,
        bucket: &BucketSpec,
        org: &str,
        token: &str,
    ) -> Result<(), ProvisionError> {
        let output = Command::new(&self.program)
            .args(Self::create_bucket_args(bucket, org, token))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProvisionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(ProvisionError::Exit {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bucket::Retention;

    fn decisions() -> BucketSpec {
        BucketSpec::new("decisions", Retention::days(365))
    }

    #[test]
    fn test_create_bucket_args() {
        let args = InfluxCli::create_bucket_args(&decisions(), "home", "s3cret");
        assert_eq!(
            args,
            vec![
                "bucket", "create", "--name", "decisions", "--org", "home", "--retention",
                "365d", "--token", "s3cret",
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let cli = InfluxCli::new("true");
        assert!(cli.create_bucket(&decisions(), "home", "s3cret").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let cli = InfluxCli::new("false");
        let err = cli.create_bucket(&decisions(), "home", "").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Exit { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let cli = InfluxCli::new("/nonexistent/influx");
        let err = cli.create_bucket(&decisions(), "home", "s3cret").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Spawn { .. }), "{err}");
    }
}
