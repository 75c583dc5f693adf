//! Long-poll queue configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// SQS queue configuration for the poll deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueueConfig {
    /// URL of the queue receiving S3 event notifications.
    #[serde(default)]
    pub url: String,
    /// Queue that permanently failing messages are forwarded to.
    #[serde(default)]
    pub dead_letter_queue_url: Option<String>,
    /// Maximum messages per receive call.
    #[serde(default = "default_max_messages")]
    #[validate(range(min = 1, max = 10))]
    pub max_messages: i32,
    /// Long-poll wait per receive call, in seconds.
    #[serde(default = "default_wait_time_seconds")]
    #[validate(range(min = 0, max = 20))]
    pub wait_time_seconds: i32,
    /// Delete permanently failing messages even when no DLQ is configured.
    #[serde(default = "default_true")]
    pub delete_permanent_failures: bool,
    /// AWS region.
    #[serde(default = "super::storage::default_region")]
    pub region: String,
    /// Custom endpoint URL (LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            dead_letter_queue_url: None,
            max_messages: default_max_messages(),
            wait_time_seconds: default_wait_time_seconds(),
            delete_permanent_failures: true,
            region: super::storage::default_region(),
            endpoint: None,
        }
    }
}

fn default_max_messages() -> i32 {
    5
}

fn default_wait_time_seconds() -> i32 {
    20
}

fn default_true() -> bool {
    true
}
