//! Local directory object storage.
//!
//! Each bucket is a sub-directory of the root and each key a relative path
//! beneath it. Used for development and by the integration tests.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use meshport_core::error::{AppError, ErrorKind};
use meshport_core::result::AppResult;
use meshport_core::traits::storage::ObjectStorage;

/// Object storage backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    /// Root directory for all buckets.
    root: PathBuf,
}

impl LocalObjectStorage {
    /// Create a new local object store rooted at the given path.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` to a path within the root.
    ///
    /// Keys may not escape their bucket directory.
    pub fn resolve(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        let bucket_path = Path::new(bucket);
        let key_path = Path::new(key.trim_start_matches('/'));

        let plain = |p: &Path| p.components().all(|c| matches!(c, Component::Normal(_)));
        if bucket.is_empty() || !plain(bucket_path) || key.is_empty() || !plain(key_path) {
            return Err(AppError::validation(format!(
                "Invalid object location: {bucket}/{key}"
            )));
        }

        Ok(self.root.join(bucket_path).join(key_path))
    }

    async fn ensure_parent(path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> AppResult<u64> {
        let source = self.resolve(bucket, key)?;
        Self::ensure_parent(dest).await?;

        let bytes = fs::copy(&source, dest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {bucket}/{key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read object: {bucket}/{key}"),
                    e,
                )
            }
        })?;

        debug!(bucket, key, bytes, "Fetched object");
        Ok(bytes)
    }

    async fn push(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        _content_type: &str,
    ) -> AppResult<u64> {
        let target = self.resolve(bucket, key)?;
        Self::ensure_parent(&target).await?;

        // Copy beside the target, then rename so readers never see a torn object.
        let staging = target.with_file_name(format!(".upload-{}", uuid::Uuid::now_v7()));
        let bytes = match fs::copy(src, &staging).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to write object: {bucket}/{key}"),
                    e,
                ));
            }
        };

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to commit object: {bucket}/{key}"),
                e,
            ));
        }

        debug!(bucket, key, bytes, "Pushed object");
        Ok(bytes)
    }
}
