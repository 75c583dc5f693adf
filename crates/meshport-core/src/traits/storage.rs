//! Object storage trait for pluggable storage backends.

use std::path::Path;

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for object storage backends.
///
/// Implementations exist for S3 and a local directory tree. Objects are
/// transferred file-to-file so that large CAD inputs never have to be held
/// in memory.
#[async_trait]
pub trait ObjectStorage: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Download `bucket/key` into the local file `dest`, returning the number
    /// of bytes written.
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> AppResult<u64>;

    /// Upload the local file `src` to `bucket/key`, overwriting any existing
    /// object. Returns the number of bytes uploaded.
    async fn push(&self, bucket: &str, key: &str, src: &Path, content_type: &str)
    -> AppResult<u64>;
}
