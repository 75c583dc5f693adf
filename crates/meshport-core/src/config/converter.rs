//! Configuration for the geometry conversion stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Tool invocation limits and tessellation settings.
///
/// Every external tool call is bounded by `stage_timeout_seconds`; inputs
/// above `max_input_bytes` are rejected before any tool runs.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// FreeCAD command-line executable (`freecadcmd`).
    pub freecad_path: PathBuf,

    /// Linear deflection used when tessellating STEP geometry into STL.
    #[validate(range(min = 0.001, max = 100.0))]
    pub tessellation_deflection: f64,

    /// Timeout in seconds for a single stage invocation.
    #[validate(range(min = 1, max = 7200))]
    pub stage_timeout_seconds: u64,

    /// Maximum retry attempts for a stage whose tool exits non-zero.
    #[validate(range(min = 0, max = 5))]
    pub max_retries: u32,

    /// Delay in seconds between retry attempts.
    pub retry_delay_seconds: u64,

    /// Minimum output size (bytes) for a stage output to count as produced.
    pub min_output_bytes: u64,

    /// Largest accepted source object, in bytes.
    #[validate(range(min = 1))]
    pub max_input_bytes: u64,

    /// Whether to capture tool stdout/stderr for diagnostics.
    pub capture_output: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            freecad_path: PathBuf::from("freecadcmd"),
            tessellation_deflection: 2.0,
            stage_timeout_seconds: 600,
            max_retries: 1,
            retry_delay_seconds: 5,
            min_output_bytes: 1,
            max_input_bytes: 512 * 1024 * 1024,
            capture_output: true,
        }
    }
}
