//! Error type for conversion stages.
//!
//! Every stage failure is a `ConversionError`; the pipeline wraps it into
//! `JobError::ConversionFailed` together with the stage name.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running a single conversion stage.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The external tool executable could not be found.
    #[error("Conversion tool not found: {path}")]
    ToolNotFound {
        /// The configured executable.
        path: PathBuf,
    },

    /// The external tool did not finish in time and was killed.
    #[error("Conversion tool timed out after {timeout_seconds}s")]
    ToolTimeout {
        /// The timeout that was exceeded.
        timeout_seconds: u64,
    },

    /// The external tool exited with a non-zero status.
    #[error("Conversion tool exited with code {code}: {stderr}")]
    ToolFailed {
        /// The exit code.
        code: i32,
        /// Captured stderr (truncated).
        stderr: String,
    },

    /// The external tool was terminated by a signal.
    #[error("Conversion tool was killed (signal termination)")]
    ToolKilled,

    /// The stage finished but its output file does not exist.
    #[error("Output file not created: {path}")]
    OutputNotCreated {
        /// Expected output path.
        path: PathBuf,
    },

    /// The output file is smaller than the configured minimum.
    #[error("Output file is too small ({size} bytes): {path}")]
    OutputEmpty {
        /// Path to the output file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
    },

    /// The OBJ input could not be parsed.
    #[error("OBJ parse error at line {line}: {reason}")]
    ObjParse {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// The mesh has no triangles to export.
    #[error("Mesh contains no faces")]
    EmptyMesh,

    /// A path handed to the tool script is not valid UTF-8.
    #[error("Path is not valid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ConversionError {
    /// Whether running the stage again may succeed.
    ///
    /// Only tool exits are retried; a timeout already consumed the full
    /// budget and is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolFailed { .. } | Self::ToolKilled)
    }
}
