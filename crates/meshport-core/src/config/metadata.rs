//! Metadata store configuration.

use serde::{Deserialize, Serialize};

/// Which store receives render-file updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataProviderKind {
    /// Metadata updates are disabled.
    #[default]
    None,
    /// DynamoDB table keyed by `pk` (owner) and `sk` (entity).
    Dynamodb,
    /// Process-local map, for development.
    Memory,
}

/// Metadata store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Metadata backend.
    #[serde(default)]
    pub provider: MetadataProviderKind,
    /// DynamoDB table name.
    #[serde(default)]
    pub table: String,
    /// Record attribute that receives the `{name, key}` reference.
    #[serde(default = "default_field")]
    pub field: String,
    /// AWS region.
    #[serde(default = "super::storage::default_region")]
    pub region: String,
    /// Custom endpoint URL (LocalStack, DynamoDB Local).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            provider: MetadataProviderKind::default(),
            table: String::new(),
            field: default_field(),
            region: super::storage::default_region(),
            endpoint: None,
        }
    }
}

impl MetadataConfig {
    /// Whether metadata updates run at all.
    pub fn enabled(&self) -> bool {
        self.provider != MetadataProviderKind::None
    }
}

fn default_field() -> String {
    "render_file".to_string()
}
