//! In-memory metadata gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use meshport_core::error::AppError;
use meshport_core::result::AppResult;
use meshport_core::traits::metadata::MetadataGateway;
use meshport_core::types::FileRef;

/// Field values of one record.
pub type Record = HashMap<String, FileRef>;

/// Process-local metadata store keyed by `(owner_id, entity_id)`.
///
/// Mirrors the DynamoDB gateway's semantics: updates merge a single field
/// and fail when the record does not exist.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataGateway {
    records: Arc<RwLock<HashMap<(String, String), Record>>>,
}

impl InMemoryMetadataGateway {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the (empty) record for `(owner_id, entity_id)` if missing.
    pub async fn insert_record(&self, owner_id: &str, entity_id: &str) {
        self.records
            .write()
            .await
            .entry((owner_id.to_string(), entity_id.to_string()))
            .or_default();
    }

    /// Read one field of a record.
    pub async fn get_field(&self, owner_id: &str, entity_id: &str, field: &str) -> Option<FileRef> {
        self.records
            .read()
            .await
            .get(&(owner_id.to_string(), entity_id.to_string()))
            .and_then(|record| record.get(field).cloned())
    }
}

#[async_trait]
impl MetadataGateway for InMemoryMetadataGateway {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn update_record(
        &self,
        owner_id: &str,
        entity_id: &str,
        field: &str,
        file: &FileRef,
    ) -> AppResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(owner_id.to_string(), entity_id.to_string()))
            .ok_or_else(|| {
                AppError::not_found(format!("No record for ({owner_id}, {entity_id})"))
            })?;
        record.insert(field.to_string(), file.clone());
        debug!(owner_id, entity_id, field, key = %file.key, "Updated record");
        Ok(())
    }
}
