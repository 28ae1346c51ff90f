// Port for the database's administrative bucket operations
use crate::domain::bucket::BucketSpec;
use async_trait::async_trait;
use thiserror::Error;

/// Why a create-bucket call failed. Callers treat every variant the same way.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
}

#[async_trait]
pub trait BucketAdmin: Send + Sync {
    async fn create_bucket(
        &self,
        bucket: &BucketSpec,
        org: &str,
        token: &str,
    ) -> Result<(), ProvisionError>;
}
