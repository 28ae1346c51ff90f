// Bucket domain model - Named, retention-bounded storage partitions
use std::fmt;

/// How long data in a bucket is kept before it becomes eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    days: u32,
}

impl Retention {
    pub const fn days(days: u32) -> Self {
        Self { days }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    pub name: String,
    pub retention: Retention,
}

impl BucketSpec {
    pub fn new(name: impl Into<String>, retention: Retention) -> Self {
        Self {
            name: name.into(),
            retention,
        }
    }
}

pub const DECISIONS_BUCKET: &str = "decisions";
pub const TELEMETRY_BUCKET: &str = "telemetry";

/// Buckets the deployment needs, in the order they are provisioned.
pub fn default_buckets() -> Vec<BucketSpec> {
    vec![
        BucketSpec::new(DECISIONS_BUCKET, Retention::days(365)),
        BucketSpec::new(TELEMETRY_BUCKET, Retention::days(90)),
    ]
}
