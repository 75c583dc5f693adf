//! # meshport-core
//!
//! Core crate for Meshport. Contains the configuration schema, the
//! conversion job model (including storage-key parsing), the gateway
//! traits implemented by the storage, metadata and queue crates, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Meshport crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, JobError};
pub use result::AppResult;
