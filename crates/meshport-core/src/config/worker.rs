//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Poll loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds to back off after a failed receive call.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            error_backoff_seconds: default_error_backoff(),
        }
    }
}

fn default_error_backoff() -> u64 {
    5
}
