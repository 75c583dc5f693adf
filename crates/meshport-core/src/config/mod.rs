//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional `config/default.toml`, an optional explicit file, and
//! `MESHPORT__`-prefixed environment variables, in increasing priority.
//! Each sub-module represents a logical configuration section.

pub mod converter;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod queue;
pub mod server;
pub mod storage;
pub mod worker;

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::converter::ConverterConfig;
use self::logging::LoggingConfig;
use self::metadata::{MetadataConfig, MetadataProviderKind};
use self::pipeline::PipelineConfig;
use self::queue::QueueConfig;
use self::server::ServerConfig;
use self::storage::{StorageConfig, StorageProviderKind};
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Every section is optional in the sources; missing sections take their
/// defaults so a bare environment-only deployment is possible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Event queue settings (poll deployment).
    #[serde(default)]
    pub queue: QueueConfig,
    /// Metadata store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Stage chains and output layout.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// External tool settings.
    #[serde(default)]
    pub converter: ConverterConfig,
    /// Poll loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default.toml` (if present), the explicit `path` (if
    /// given, required), and environment variables prefixed with
    /// `MESHPORT__` (`MESHPORT__QUEUE__URL=...`).
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("MESHPORT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Run field-level and cross-field validation.
    ///
    /// Called once at startup so misconfiguration fails before any event
    /// is consumed.
    pub fn validate_all(&self) -> Result<(), AppError> {
        self.storage.validate()?;
        self.queue.validate()?;
        self.converter.validate()?;

        if self.storage.provider == StorageProviderKind::S3 && self.storage.bucket.is_empty() {
            return Err(AppError::configuration(
                "storage.bucket is required for the s3 provider",
            ));
        }

        if self.metadata.provider == MetadataProviderKind::Dynamodb
            && self.metadata.table.is_empty()
        {
            return Err(AppError::configuration(
                "metadata.table is required for the dynamodb provider",
            ));
        }

        if self.metadata.enabled() && self.metadata.field.is_empty() {
            return Err(AppError::configuration("metadata.field must not be empty"));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(AppError::configuration(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            )));
        }

        self.pipeline.validate_chains()
    }

    /// Validation for the long-poll deployment, which additionally needs
    /// a queue URL.
    pub fn require_queue(&self) -> Result<(), AppError> {
        if self.queue.url.is_empty() {
            return Err(AppError::configuration(
                "queue.url is required for the poll deployment",
            ));
        }
        Ok(())
    }
}
