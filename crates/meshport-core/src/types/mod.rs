//! Core type definitions used across the Meshport workspace.

pub mod event;
pub mod format;
pub mod job;

pub use event::{S3EventNotification, S3EventRecord};
pub use format::{MeshFormat, StageKind};
pub use job::{ConversionJob, ConversionResult, FileRef, KeyLayout};
