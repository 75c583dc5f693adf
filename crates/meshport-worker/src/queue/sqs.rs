//! SQS message queue.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_sdk_sqs::Client;
use tracing::{debug, error, info};

use meshport_core::error::{AppError, ErrorKind};
use meshport_core::result::AppResult;
use meshport_core::traits::queue::{MessageQueue, QueueMessage};

/// SQS queue bound to one queue URL.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Create a new SQS queue client.
    ///
    /// `endpoint` points the client at an SQS-compatible service
    /// (LocalStack).
    pub async fn new(queue_url: &str, region: &str, endpoint: Option<&str>) -> AppResult<Self> {
        if queue_url.is_empty() {
            return Err(AppError::configuration("Queue URL is empty"));
        }

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.to_string()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_retry_mode(RetryMode::Adaptive);

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config)
            .load()
            .await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(queue_url, region, endpoint = ?endpoint, "Initialized SQS queue");

        Ok(Self::from_client(Client::from_conf(builder.build()), queue_url))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// URL of the bound queue.
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    fn provider_type(&self) -> &str {
        "sqs"
    }

    async fn receive(&self, max_messages: i32, wait_seconds: i32) -> AppResult<Vec<QueueMessage>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| {
                error!(queue_url = %self.queue_url, error = %e, "SQS receive failed");
                AppError::with_source(ErrorKind::Queue, "Failed to receive messages", e)
            })?;

        let messages: Vec<QueueMessage> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let Some(receipt_handle) = m.receipt_handle else {
                    debug!(message_id = ?m.message_id, "Skipping message without receipt handle");
                    return None;
                };
                Some(QueueMessage {
                    message_id: m.message_id.unwrap_or_default(),
                    receipt_handle,
                    body: m.body.unwrap_or_default(),
                })
            })
            .collect();

        debug!(count = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> AppResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                error!(queue_url = %self.queue_url, error = %e, "SQS delete failed");
                AppError::with_source(ErrorKind::Queue, "Failed to delete message", e)
            })?;
        Ok(())
    }

    async fn send(&self, queue_url: Option<&str>, body: &str) -> AppResult<()> {
        let target = queue_url.unwrap_or(&self.queue_url);
        self.client
            .send_message()
            .queue_url(target)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                error!(queue_url = target, error = %e, "SQS send failed");
                AppError::with_source(ErrorKind::Queue, format!("Failed to send message to {target}"), e)
            })?;
        Ok(())
    }
}
