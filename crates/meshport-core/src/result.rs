//! Convenience result type alias for Meshport.

use crate::error::AppError;

/// A specialized `Result` type for Meshport infrastructure operations.
///
/// Per-job failures use [`crate::error::JobError`] instead.
pub type AppResult<T> = Result<T, AppError>;
