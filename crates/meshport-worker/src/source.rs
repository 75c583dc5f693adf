//! Event sources: queue long-poll and push-event payloads.
//!
//! Both variants normalize their input into [`Delivery`] values so the
//! runner treats them identically. Key parsing happens here; a delivery
//! whose key cannot be parsed carries the `MalformedKey` error instead of a
//! job.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use meshport_core::config::queue::QueueConfig;
use meshport_core::error::JobError;
use meshport_core::result::AppResult;
use meshport_core::traits::queue::{MessageQueue, QueueMessage};
use meshport_core::types::{ConversionJob, KeyLayout, S3EventNotification, S3EventRecord};

/// One record handed to the runner.
#[derive(Debug)]
pub struct Delivery {
    /// Position within its batch.
    pub index: usize,
    /// Decoded object key (raw key when decoding failed).
    pub key: String,
    /// Parse outcome.
    pub job: Result<ConversionJob, JobError>,
    /// Opaque acknowledgment handle (queue receipt handle).
    pub ack_handle: Option<String>,
    /// Raw message body, forwarded on quarantine.
    pub body: Option<String>,
}

/// A source of deliveries.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Source name used in logs.
    fn name(&self) -> &str;

    /// Next batch. `None` means the source is exhausted; an empty batch is
    /// not an error.
    async fn receive(&mut self) -> AppResult<Option<Vec<Delivery>>>;

    /// Acknowledge a fully processed delivery.
    async fn acknowledge(&self, delivery: &Delivery) -> AppResult<()>;

    /// Quarantine a permanently failing delivery. Returns whether the
    /// delivery was removed from the source.
    async fn quarantine(&self, delivery: &Delivery) -> AppResult<bool>;
}

/// Parse one notification record into a delivery.
///
/// The bucket comes from the record, falling back to `default_bucket`.
pub fn delivery_from_record(
    index: usize,
    record: &S3EventRecord,
    default_bucket: &str,
    layout: KeyLayout,
) -> Delivery {
    let raw_key = record.s3.object.key.clone();
    let parsed = record.object_key().and_then(|key| {
        let bucket = record
            .bucket_name()
            .filter(|b| !b.is_empty())
            .unwrap_or(default_bucket);
        if bucket.is_empty() {
            return Err(JobError::malformed_key(
                &key,
                "record names no bucket and no default bucket is configured",
            ));
        }
        ConversionJob::from_key(bucket, &key, layout)
            .map(|job| job.with_declared_size(record.s3.object.size))
    });

    let key = match &parsed {
        Ok(job) => job.source_key.clone(),
        Err(JobError::MalformedKey { key, .. }) => key.clone(),
        Err(_) => raw_key,
    };

    Delivery {
        index,
        key,
        job: parsed,
        ack_handle: None,
        body: None,
    }
}

/// Parse one queue message into a delivery. Only the first record of the
/// body is consumed.
pub fn delivery_from_message(
    index: usize,
    message: &QueueMessage,
    default_bucket: &str,
    layout: KeyLayout,
) -> Delivery {
    let mut delivery = match S3EventNotification::from_json(&message.body) {
        Ok(notification) => match notification.records.first() {
            Some(record) => delivery_from_record(index, record, default_bucket, layout),
            None => unparsed(index, "message carries no event records"),
        },
        Err(e) => unparsed(index, format!("message body is not an S3 event: {e}")),
    };
    delivery.ack_handle = Some(message.receipt_handle.clone());
    delivery.body = Some(message.body.clone());
    delivery
}

fn unparsed(index: usize, reason: impl Into<String>) -> Delivery {
    Delivery {
        index,
        key: String::new(),
        job: Err(JobError::malformed_key("", reason)),
        ack_handle: None,
        body: None,
    }
}

/// Long-poll queue source; never exhausted.
#[derive(Debug)]
pub struct QueueEventSource {
    queue: Arc<dyn MessageQueue>,
    config: QueueConfig,
    default_bucket: String,
    layout: KeyLayout,
}

impl QueueEventSource {
    /// Create a queue source.
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        config: QueueConfig,
        default_bucket: impl Into<String>,
        layout: KeyLayout,
    ) -> Self {
        Self {
            queue,
            config,
            default_bucket: default_bucket.into(),
            layout,
        }
    }
}

#[async_trait]
impl EventSource for QueueEventSource {
    fn name(&self) -> &str {
        self.queue.provider_type()
    }

    async fn receive(&mut self) -> AppResult<Option<Vec<Delivery>>> {
        let messages = self
            .queue
            .receive(self.config.max_messages, self.config.wait_time_seconds)
            .await?;

        if messages.is_empty() {
            debug!("No messages in the queue");
        }

        Ok(Some(
            messages
                .iter()
                .enumerate()
                .map(|(i, m)| delivery_from_message(i, m, &self.default_bucket, self.layout))
                .collect(),
        ))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> AppResult<()> {
        if let Some(handle) = &delivery.ack_handle {
            self.queue.delete(handle).await?;
            debug!(key = %delivery.key, "Deleted message");
        }
        Ok(())
    }

    async fn quarantine(&self, delivery: &Delivery) -> AppResult<bool> {
        let Some(handle) = &delivery.ack_handle else {
            return Ok(false);
        };

        match (&self.config.dead_letter_queue_url, &delivery.body) {
            (Some(dlq), Some(body)) if !dlq.is_empty() => {
                self.queue.send(Some(dlq), body).await?;
                info!(key = %delivery.key, dead_letter_queue = %dlq, "Forwarded message to dead-letter queue");
            }
            _ if self.config.delete_permanent_failures => {}
            _ => {
                warn!(key = %delivery.key, "Leaving permanently failing message to the queue's redrive policy");
                return Ok(false);
            }
        }

        self.queue.delete(handle).await?;
        Ok(true)
    }
}

/// One push-event payload; yields a single batch, then is exhausted.
#[derive(Debug)]
pub struct PushEventSource {
    batch: Option<Vec<Delivery>>,
}

impl PushEventSource {
    /// Build a source from a parsed notification.
    pub fn new(notification: &S3EventNotification, default_bucket: &str, layout: KeyLayout) -> Self {
        let batch = notification
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| delivery_from_record(i, record, default_bucket, layout))
            .collect();
        Self { batch: Some(batch) }
    }

    /// Parse a JSON payload. An unparseable payload becomes a single
    /// malformed delivery so the caller still gets a report.
    pub fn from_json(payload: &str, default_bucket: &str, layout: KeyLayout) -> Self {
        match S3EventNotification::from_json(payload) {
            Ok(notification) => Self::new(&notification, default_bucket, layout),
            Err(e) => Self {
                batch: Some(vec![unparsed(0, format!("payload is not an S3 event: {e}"))]),
            },
        }
    }
}

#[async_trait]
impl EventSource for PushEventSource {
    fn name(&self) -> &str {
        "push"
    }

    async fn receive(&mut self) -> AppResult<Option<Vec<Delivery>>> {
        Ok(self.batch.take())
    }

    async fn acknowledge(&self, _delivery: &Delivery) -> AppResult<()> {
        Ok(())
    }

    async fn quarantine(&self, _delivery: &Delivery) -> AppResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;

    fn body(bucket: &str, key: &str) -> String {
        serde_json::to_string(&S3EventNotification::single(bucket, key)).unwrap()
    }

    #[test]
    fn test_push_payload_yields_one_delivery_per_record() {
        let payload = r#"{"Records":[
            {"s3":{"bucket":{"name":"files"},"object":{"key":"user123/part1.step"}}},
            {"s3":{"bucket":{"name":"files"},"object":{"key":"part1.step"}}}
        ]}"#;
        let source = PushEventSource::from_json(payload, "", KeyLayout::OwnerFile);
        let batch = source.batch.as_ref().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].job.as_ref().unwrap().owner_id, "user123");
        assert_eq!(batch[0].job.as_ref().unwrap().source_bucket, "files");
        assert!(matches!(batch[1].job, Err(JobError::MalformedKey { .. })));
        assert_eq!(batch[1].index, 1);
    }

    #[test]
    fn test_record_size_carried_into_job() {
        let payload = r#"{"Records":[
            {"s3":{"bucket":{"name":"files"},"object":{"key":"user123/big.step","size":734003200}}},
            {"s3":{"bucket":{"name":"files"},"object":{"key":"user123/small.step"}}}
        ]}"#;
        let source = PushEventSource::from_json(payload, "", KeyLayout::OwnerFile);
        let batch = source.batch.as_ref().unwrap();
        assert_eq!(batch[0].job.as_ref().unwrap().declared_size, Some(734_003_200));
        assert_eq!(batch[1].job.as_ref().unwrap().declared_size, None);
    }

    #[tokio::test]
    async fn test_push_source_is_exhausted_after_one_batch() {
        let mut source = PushEventSource::from_json("not json", "b", KeyLayout::OwnerFile);
        let batch = source.receive().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch[0].job.is_err());
        assert!(source.receive().await.unwrap().is_none());
    }

    #[test]
    fn test_message_falls_back_to_default_bucket() {
        let message = QueueMessage {
            message_id: "1".into(),
            receipt_handle: "r".into(),
            body: r#"{"Records":[{"s3":{"object":{"key":"user9/My+Part.step"}}}]}"#.into(),
        };
        let delivery = delivery_from_message(0, &message, "fallback", KeyLayout::OwnerFile);
        let job = delivery.job.unwrap();
        assert_eq!(job.source_bucket, "fallback");
        assert_eq!(job.source_key, "user9/My Part.step");
        assert_eq!(delivery.ack_handle.as_deref(), Some("r"));
    }

    #[test]
    fn test_test_event_is_malformed() {
        let message = QueueMessage {
            message_id: "1".into(),
            receipt_handle: "r".into(),
            body: r#"{"Service":"Amazon S3","Event":"s3:TestEvent"}"#.into(),
        };
        let delivery = delivery_from_message(0, &message, "b", KeyLayout::OwnerFile);
        assert!(matches!(delivery.job, Err(JobError::MalformedKey { .. })));
        assert!(delivery.body.is_some());
    }

    #[tokio::test]
    async fn test_quarantine_forwards_to_dead_letter_queue() {
        let queue = InMemoryQueue::new();
        queue.enqueue("garbage").await;
        let config = QueueConfig {
            dead_letter_queue_url: Some("dlq".into()),
            ..QueueConfig::default()
        };
        let mut source = QueueEventSource::new(
            Arc::new(queue.clone()),
            config,
            "b",
            KeyLayout::OwnerFile,
        );

        let batch = source.receive().await.unwrap().unwrap();
        assert!(source.quarantine(&batch[0]).await.unwrap());
        assert_eq!(queue.sent_to("dlq").await, vec!["garbage".to_string()]);
        assert_eq!(queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_quarantine_without_dlq_respects_delete_flag() {
        let queue = InMemoryQueue::new();
        queue.enqueue(body("b", "u/x.dwg")).await;
        let config = QueueConfig {
            delete_permanent_failures: false,
            ..QueueConfig::default()
        };
        let mut source = QueueEventSource::new(
            Arc::new(queue.clone()),
            config,
            "b",
            KeyLayout::OwnerFile,
        );

        let batch = source.receive().await.unwrap().unwrap();
        assert!(!source.quarantine(&batch[0]).await.unwrap());
        assert!(queue.deleted().await.is_empty());
        assert_eq!(queue.in_flight_len().await, 1);
    }
}
