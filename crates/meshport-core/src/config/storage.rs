//! Object storage configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which object store backs the storage gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderKind {
    /// Amazon S3 or an S3-compatible service.
    #[default]
    S3,
    /// A local directory where each bucket is a sub-directory.
    Local,
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Storage backend.
    #[serde(default)]
    pub provider: StorageProviderKind,
    /// Bucket uploads arrive in; used when an event omits the bucket name.
    #[serde(default)]
    #[validate(length(max = 63))]
    pub bucket: String,
    /// Bucket converted artifacts are written to (defaults to the source bucket).
    #[serde(default)]
    pub output_bucket: Option<String>,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Root directory for the `local` provider.
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProviderKind::default(),
            bucket: String::new(),
            output_bucket: None,
            region: default_region(),
            endpoint: None,
            local_root: default_local_root(),
        }
    }
}

impl StorageConfig {
    /// Bucket for converted artifacts given the job's source bucket.
    pub fn output_bucket_for<'a>(&'a self, source_bucket: &'a str) -> &'a str {
        self.output_bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(source_bucket)
    }
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_local_root() -> String {
    "./data/storage".to_string()
}
