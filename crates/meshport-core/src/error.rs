//! Unified error types for Meshport.
//!
//! Infrastructure failures (configuration, client construction, queue
//! receive) are carried by [`AppError`]. Failures that belong to a single
//! conversion job are carried by [`JobError`], which the job runner catches
//! at the per-job boundary.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested object or record was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// An internal error occurred.
    Internal,
    /// An object storage or local filesystem error occurred.
    Storage,
    /// A message queue error occurred.
    Queue,
    /// A metadata store error occurred.
    Metadata,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Queue => write!(f, "QUEUE"),
            Self::Metadata => write!(f, "METADATA"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified infrastructure error used throughout Meshport.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a queue error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Queue, message)
    }

    /// Create a metadata store error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Metadata, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Invalid configuration: {err}"),
            err,
        )
    }
}

/// A failure scoped to one conversion job.
///
/// Every variant is caught at the per-job boundary by the job runner; none
/// of them terminate the process or abort sibling jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// The storage key does not split into the configured layout.
    #[error("Malformed key '{key}': {reason}")]
    MalformedKey {
        /// The offending key (decoded).
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No stage chain is configured for the source format.
    #[error("Unsupported source format '{format}'")]
    UnsupportedFormat {
        /// The source format (lowercased extension).
        format: String,
    },

    /// The downloaded input exceeds the configured size ceiling.
    #[error("Input is {size} bytes, exceeding the {limit} byte limit")]
    InputTooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// The source object could not be fetched.
    #[error("Download of s3://{bucket}/{key} failed: {source}")]
    DownloadFailed {
        /// Source bucket.
        bucket: String,
        /// Source key.
        key: String,
        /// Underlying storage error.
        #[source]
        source: AppError,
    },

    /// A conversion stage failed.
    #[error("Stage '{stage}' failed: {source}")]
    ConversionFailed {
        /// Name of the failing stage.
        stage: String,
        /// Underlying stage error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The converted artifact could not be uploaded.
    #[error("Upload to s3://{bucket}/{key} failed: {source}")]
    UploadFailed {
        /// Destination bucket.
        bucket: String,
        /// Destination key.
        key: String,
        /// Underlying storage error.
        #[source]
        source: AppError,
    },

    /// The metadata record could not be updated.
    #[error("Metadata update for ({owner_id}, {entity_id}) failed: {source}")]
    MetadataUpdateFailed {
        /// Owner key of the record.
        owner_id: String,
        /// Entity key of the record.
        entity_id: String,
        /// Underlying metadata error.
        #[source]
        source: AppError,
    },

    /// The scratch workspace could not be prepared.
    #[error("Workspace {path} unavailable: {source}")]
    Workspace {
        /// Workspace directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    /// Build a `MalformedKey` error.
    pub fn malformed_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same job can never succeed.
    ///
    /// Permanent failures are quarantined instead of redelivered.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::MalformedKey { .. } | Self::UnsupportedFormat { .. } | Self::InputTooLarge { .. }
        )
    }

    /// Short machine-readable code for reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey { .. } => "malformed_key",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::InputTooLarge { .. } => "input_too_large",
            Self::DownloadFailed { .. } => "download_failed",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::UploadFailed { .. } => "upload_failed",
            Self::MetadataUpdateFailed { .. } => "metadata_update_failed",
            Self::Workspace { .. } => "workspace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_classification() {
        assert!(JobError::malformed_key("a", "b").is_permanent());
        assert!(
            JobError::UnsupportedFormat {
                format: "dwg".into()
            }
            .is_permanent()
        );
        assert!(
            !JobError::DownloadFailed {
                bucket: "b".into(),
                key: "k".into(),
                source: AppError::storage("boom"),
            }
            .is_permanent()
        );
        assert!(
            !JobError::ConversionFailed {
                stage: "step_to_stl".into(),
                source: "tool crashed".into(),
            }
            .is_permanent()
        );
    }

    #[test]
    fn test_display_includes_stage() {
        let err = JobError::ConversionFailed {
            stage: "obj_to_glb".into(),
            source: "no triangles".into(),
        };
        assert_eq!(err.to_string(), "Stage 'obj_to_glb' failed: no triangles");
        assert_eq!(err.code(), "conversion_failed");
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::queue("receive failed");
        assert_eq!(err.to_string(), "QUEUE: receive failed");
    }
}
