//! DynamoDB metadata gateway (requires the `dynamodb` feature).

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use tracing::{error, info};

use meshport_core::error::{AppError, ErrorKind};
use meshport_core::result::AppResult;
use meshport_core::traits::metadata::MetadataGateway;
use meshport_core::types::FileRef;

/// Updates records of a table keyed by `pk` (owner) and `sk` (entity).
#[derive(Debug, Clone)]
pub struct DynamoMetadataGateway {
    client: Client,
    table: String,
}

impl DynamoMetadataGateway {
    /// Create a gateway for `table`.
    pub async fn new(table: &str, region: &str, endpoint: Option<&str>) -> AppResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.to_string()));
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(table, region, "Initialized DynamoDB metadata gateway");

        Ok(Self::from_client(Client::from_conf(builder.build()), table))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }
}

/// `{name, key}` as a DynamoDB map attribute.
fn file_attribute(file: &FileRef) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        (String::from("name"), AttributeValue::S(file.name.clone())),
        (String::from("key"), AttributeValue::S(file.key.clone())),
    ]))
}

#[async_trait]
impl MetadataGateway for DynamoMetadataGateway {
    fn provider_type(&self) -> &str {
        "dynamodb"
    }

    async fn update_record(
        &self,
        owner_id: &str,
        entity_id: &str,
        field: &str,
        file: &FileRef,
    ) -> AppResult<()> {
        let response = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("pk", AttributeValue::S(owner_id.to_string()))
            .key("sk", AttributeValue::S(entity_id.to_string()))
            .update_expression("SET #field = :file, updated_at = :updated_at")
            .condition_expression("attribute_exists(pk)")
            .set_expression_attribute_names(Some(HashMap::from([(
                String::from("#field"),
                field.to_string(),
            )])))
            .set_expression_attribute_values(Some(HashMap::from([
                (String::from(":file"), file_attribute(file)),
                (
                    String::from(":updated_at"),
                    AttributeValue::S(Utc::now().to_rfc3339()),
                ),
            ])))
            .send()
            .await;

        match response {
            Ok(_) => {
                info!(table = %self.table, owner_id, entity_id, field, key = %file.key, "Updated record");
                Ok(())
            }
            Err(SdkError::ServiceError(service_err))
                if matches!(
                    service_err.err(),
                    UpdateItemError::ConditionalCheckFailedException(_)
                ) =>
            {
                Err(AppError::not_found(format!(
                    "No record ({owner_id}, {entity_id}) in table {}",
                    self.table
                )))
            }
            Err(e) => {
                error!(error = %e, table = %self.table, owner_id, entity_id, "UpdateItem failed");
                Err(AppError::with_source(
                    ErrorKind::Metadata,
                    format!("UpdateItem on {} failed", self.table),
                    e,
                ))
            }
        }
    }
}
