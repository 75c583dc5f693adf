//! # meshport-storage
//!
//! Object storage gateways for Meshport. Supports S3-compatible object
//! stores (behind the `s3` feature) and a local directory tree.

pub mod providers;

use std::sync::Arc;

use meshport_core::config::storage::{StorageConfig, StorageProviderKind};
use meshport_core::result::AppResult;
use meshport_core::traits::storage::ObjectStorage;

pub use providers::LocalObjectStorage;
#[cfg(feature = "s3")]
pub use providers::S3ObjectStorage;

/// Construct the storage gateway selected by configuration.
pub async fn build_storage(config: &StorageConfig) -> AppResult<Arc<dyn ObjectStorage>> {
    match config.provider {
        StorageProviderKind::Local => {
            let storage = LocalObjectStorage::new(&config.local_root).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "s3")]
        StorageProviderKind::S3 => {
            let storage = S3ObjectStorage::new(&config.region, config.endpoint.as_deref()).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "s3"))]
        StorageProviderKind::S3 => Err(meshport_core::error::AppError::configuration(
            "storage.provider = \"s3\" requires the `s3` feature",
        )),
    }
}
