//! # meshport-metadata
//!
//! Metadata gateways for Meshport. The DynamoDB gateway (behind the
//! `dynamodb` feature) updates the `parts` table; the in-memory gateway
//! backs development deployments and tests.

pub mod memory;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;

use std::sync::Arc;

use meshport_core::config::metadata::{MetadataConfig, MetadataProviderKind};
use meshport_core::result::AppResult;
use meshport_core::traits::metadata::MetadataGateway;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoMetadataGateway;
pub use memory::InMemoryMetadataGateway;

/// Construct the metadata gateway selected by configuration.
///
/// Returns `None` when metadata updates are disabled.
pub async fn build_metadata(config: &MetadataConfig) -> AppResult<Option<Arc<dyn MetadataGateway>>> {
    match config.provider {
        MetadataProviderKind::None => Ok(None),
        MetadataProviderKind::Memory => Ok(Some(Arc::new(InMemoryMetadataGateway::new()))),
        #[cfg(feature = "dynamodb")]
        MetadataProviderKind::Dynamodb => {
            let gateway =
                DynamoMetadataGateway::new(&config.table, &config.region, config.endpoint.as_deref())
                    .await?;
            Ok(Some(Arc::new(gateway)))
        }
        #[cfg(not(feature = "dynamodb"))]
        MetadataProviderKind::Dynamodb => Err(meshport_core::error::AppError::configuration(
            "metadata.provider = \"dynamodb\" requires the `dynamodb` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_metadata_builds_nothing() {
        let gateway = build_metadata(&MetadataConfig::default()).await.unwrap();
        assert!(gateway.is_none());
    }

    #[tokio::test]
    async fn test_memory_metadata() {
        let config = MetadataConfig {
            provider: MetadataProviderKind::Memory,
            ..Default::default()
        };
        let gateway = build_metadata(&config).await.unwrap().unwrap();
        assert_eq!(gateway.provider_type(), "memory");
    }
}
