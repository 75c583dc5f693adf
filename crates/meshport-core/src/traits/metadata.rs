//! Metadata store trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::job::FileRef;

/// Writes converted-artifact references into the record describing an
/// uploaded entity.
#[async_trait]
pub trait MetadataGateway: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "dynamodb", "memory").
    fn provider_type(&self) -> &str;

    /// Set `field` on the record keyed by (`owner_id`, `entity_id`) to
    /// `file`. The record must already exist; a missing record is an error.
    async fn update_record(
        &self,
        owner_id: &str,
        entity_id: &str,
        field: &str,
        file: &FileRef,
    ) -> AppResult<()>;
}
