//! Message queue trait for the long-poll deployment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Provider-assigned message id.
    pub message_id: String,
    /// Handle used to delete the message once handled.
    pub receipt_handle: String,
    /// Raw message body.
    pub body: String,
}

/// Trait for at-least-once message queues.
///
/// A received message that is not deleted becomes visible again after the
/// queue's visibility timeout.
#[async_trait]
pub trait MessageQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "sqs", "memory").
    fn provider_type(&self) -> &str;

    /// Long-poll for up to `max_messages` messages, waiting at most
    /// `wait_seconds`. An empty vector means the wait elapsed.
    async fn receive(&self, max_messages: i32, wait_seconds: i32) -> AppResult<Vec<QueueMessage>>;

    /// Delete a handled message.
    async fn delete(&self, receipt_handle: &str) -> AppResult<()>;

    /// Send a message body to `queue_url`, or to this queue when `None`.
    async fn send(&self, queue_url: Option<&str>, body: &str) -> AppResult<()>;
}
