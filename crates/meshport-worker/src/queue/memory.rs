//! In-memory message queue with visibility semantics.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use meshport_core::error::AppError;
use meshport_core::result::AppResult;
use meshport_core::traits::queue::{MessageQueue, QueueMessage};

#[derive(Debug, Default)]
struct State {
    visible: VecDeque<(String, String)>,
    in_flight: HashMap<String, (String, String)>,
    deleted: Vec<String>,
    sent: HashMap<String, Vec<String>>,
}

/// Process-local queue.
///
/// Received messages stay in flight until deleted; [`requeue_in_flight`]
/// plays the part of an expired visibility timeout. An empty receive waits
/// up to `wait_seconds` for a message, like a long poll.
///
/// [`requeue_in_flight`]: InMemoryQueue::requeue_in_flight
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<State>>,
    arrivals: Arc<Notify>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a body and return its message id.
    pub async fn enqueue(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .await
            .visible
            .push_back((id.clone(), body.into()));
        self.arrivals.notify_waiters();
        id
    }

    /// Make every in-flight message visible again.
    pub async fn requeue_in_flight(&self) {
        let mut state = self.state.lock().await;
        let returned: Vec<_> = state.in_flight.drain().map(|(_, m)| m).collect();
        state.visible.extend(returned);
        self.arrivals.notify_waiters();
    }

    /// Number of visible messages.
    pub async fn visible_len(&self) -> usize {
        self.state.lock().await.visible.len()
    }

    /// Number of received, undeleted messages.
    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Ids of deleted messages, in deletion order.
    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    /// Bodies sent to `queue_url`.
    pub async fn sent_to(&self, queue_url: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .get(queue_url)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn receive(&self, max_messages: i32, wait_seconds: i32) -> AppResult<Vec<QueueMessage>> {
        if wait_seconds > 0 && self.visible_len().await == 0 {
            let wait = Duration::from_secs(u64::from(wait_seconds.unsigned_abs()));
            let _ = tokio::time::timeout(wait, self.arrivals.notified()).await;
        }

        let mut state = self.state.lock().await;
        let take = usize::try_from(max_messages.max(0))
            .unwrap_or(0)
            .min(state.visible.len());

        let drained: Vec<_> = state.visible.drain(..take).collect();
        let mut messages = Vec::with_capacity(take);
        for (message_id, body) in drained {
            let receipt_handle = Uuid::new_v4().to_string();
            state
                .in_flight
                .insert(receipt_handle.clone(), (message_id.clone(), body.clone()));
            messages.push(QueueMessage {
                message_id,
                receipt_handle,
                body,
            });
        }
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let (message_id, _) = state
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| AppError::queue(format!("Unknown receipt handle: {receipt_handle}")))?;
        state.deleted.push(message_id);
        Ok(())
    }

    async fn send(&self, queue_url: Option<&str>, body: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match queue_url {
            Some(url) => {
                state
                    .sent
                    .entry(url.to_string())
                    .or_default()
                    .push(body.to_string());
            }
            None => {
                state
                    .visible
                    .push_back((Uuid::new_v4().to_string(), body.to_string()));
                self.arrivals.notify_waiters();
            }
        }
        Ok(())
    }
}
