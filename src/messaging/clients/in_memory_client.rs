//! # In-Memory Message Bus
//!
//! In-memory bus implementation for tests, the local simulator and
//! single-process deployments. Stores messages per topic with delayed
//! visibility and claim (visibility timeout) semantics, so redelivery after a
//! nack or an expired claim behaves like a real at-least-once broker.
//!
//! ## Usage
//!
//! ```rust
//! use ocr_pipeline::messaging::{encode_payload, InMemoryBus, MessagePublisher, MessageSubscriber, ReadRequest};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let bus = InMemoryBus::new();
//! let message = encode_payload(&ReadRequest::new("a.jpg", "en")).unwrap();
//! bus.publish("read-requests", message).await.unwrap();
//!
//! let deliveries = bus.receive("read-requests", 10, Duration::from_secs(30)).await.unwrap();
//! assert_eq!(deliveries.len(), 1);
//! bus.ack("read-requests", &deliveries[0].delivery_id).await.unwrap();
//! # });
//! ```
//!
//! Time is read from `tokio::time`, so tests running with a paused clock see
//! delayed messages appear as the clock advances.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::messaging::envelope::{decode_payload, PubsubMessage};
use crate::messaging::errors::{MessagingError, MessagingResult};

use super::{
    traits::{MessagePublisher, MessageSubscriber},
    types::{Delivery, TopicMetrics},
};

#[derive(Debug, Clone)]
struct Claim {
    delivery_id: String,
    until: Instant,
}

/// Message wrapper for in-memory storage with metadata
#[derive(Debug, Clone)]
struct InMemoryMessage {
    message: PubsubMessage,
    visible_at: Instant,
    claim: Option<Claim>,
    attempts: u32,
}

impl InMemoryMessage {
    fn is_available(&self, now: Instant) -> bool {
        self.visible_at <= now
            && self
                .claim
                .as_ref()
                .map(|claim| claim.until <= now)
                .unwrap_or(true)
    }

}

/// Published messages kept per topic for inspection
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// In-memory topic storage
#[derive(Debug, Default)]
struct InMemoryTopic {
    messages: VecDeque<InMemoryMessage>,
    history: VecDeque<PubsubMessage>,
    published_total: u64,
}

/// In-memory bus implementing both the publishing and the consuming side
#[derive(Debug)]
pub struct InMemoryBus {
    topics: Mutex<HashMap<String, InMemoryTopic>>,
    publish_failures: Mutex<HashMap<String, usize>>,
    next_id: AtomicU64,
    history_limit: usize,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            publish_failures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` published messages per topic; zero disables history
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Make the next `count` publishes to `topic` fail
    pub async fn fail_next_publishes(&self, topic: &str, count: usize) {
        self.publish_failures
            .lock()
            .await
            .insert(topic.to_string(), count);
    }

    async fn take_injected_failure(&self, topic: &str) -> bool {
        let mut failures = self.publish_failures.lock().await;
        match failures.get_mut(topic) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    async fn enqueue(
        &self,
        topic: &str,
        mut message: PubsubMessage,
        delay: Duration,
    ) -> MessagingResult<String> {
        if self.take_injected_failure(topic).await {
            warn!(topic = %topic, "Injected publish failure");
            return Err(MessagingError::publish(topic, "injected publish failure"));
        }

        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        message.message_id = message_id.clone();
        message.publish_time = Some(chrono::Utc::now());

        let mut topics = self.topics.lock().await;
        let queue = topics.entry(topic.to_string()).or_default();
        if self.history_limit > 0 {
            if queue.history.len() == self.history_limit {
                queue.history.pop_front();
            }
            queue.history.push_back(message.clone());
        }
        queue.published_total += 1;
        queue.messages.push_back(InMemoryMessage {
            message,
            visible_at: Instant::now() + delay,
            claim: None,
            attempts: 0,
        });

        debug!(
            topic = %topic,
            message_id = %message_id,
            delay_ms = delay.as_millis() as u64,
            "Message enqueued"
        );
        Ok(message_id)
    }

    /// The most recent messages published to `topic`, oldest first, up to the
    /// history limit
    pub async fn published(&self, topic: &str) -> Vec<PubsubMessage> {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|queue| queue.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Decoded payloads of [`InMemoryBus::published`]
    pub async fn published_payloads<T: DeserializeOwned>(
        &self,
        topic: &str,
    ) -> MessagingResult<Vec<T>> {
        self.published(topic)
            .await
            .iter()
            .map(decode_payload)
            .collect()
    }

    /// Messages on `topic` that have not been acknowledged
    pub async fn pending(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|queue| queue.messages.len())
            .unwrap_or(0)
    }

    /// Unacknowledged messages across all topics
    pub async fn total_pending(&self) -> usize {
        self.topics
            .lock()
            .await
            .values()
            .map(|queue| queue.messages.len())
            .sum()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBus {
    async fn publish(&self, topic: &str, message: PubsubMessage) -> MessagingResult<String> {
        self.enqueue(topic, message, Duration::ZERO).await
    }

    async fn publish_delayed(
        &self,
        topic: &str,
        message: PubsubMessage,
        delay: Duration,
    ) -> MessagingResult<String> {
        self.enqueue(topic, message, delay).await
    }

    fn client_type(&self) -> &'static str {
        "in_memory"
    }
}

#[async_trait]
impl MessageSubscriber for InMemoryBus {
    async fn receive(
        &self,
        topic: &str,
        limit: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>> {
        let now = Instant::now();
        let mut topics = self.topics.lock().await;
        let Some(queue) = topics.get_mut(topic) else {
            return Ok(Vec::new());
        };

        let mut deliveries = Vec::new();
        for message in queue.messages.iter_mut() {
            if deliveries.len() >= limit {
                break;
            }
            if !message.is_available(now) {
                continue;
            }

            message.attempts += 1;
            let delivery_id = Uuid::new_v4().to_string();
            message.claim = Some(Claim {
                delivery_id: delivery_id.clone(),
                until: now + visibility_timeout,
            });
            deliveries.push(Delivery {
                delivery_id,
                message: message.message.clone(),
                attempt: message.attempts,
            });
        }

        Ok(deliveries)
    }

    async fn ack(&self, topic: &str, delivery_id: &str) -> MessagingResult<()> {
        let mut topics = self.topics.lock().await;
        let queue = topics
            .get_mut(topic)
            .ok_or_else(|| MessagingError::topic_not_found(topic))?;

        let position = queue.messages.iter().position(|message| {
            message
                .claim
                .as_ref()
                .map(|claim| claim.delivery_id == delivery_id)
                .unwrap_or(false)
        });

        match position {
            Some(index) => {
                queue.messages.remove(index);
                Ok(())
            }
            None => Err(MessagingError::acknowledge(
                topic,
                delivery_id,
                "unknown or superseded delivery",
            )),
        }
    }

    async fn nack(&self, topic: &str, delivery_id: &str) -> MessagingResult<()> {
        let mut topics = self.topics.lock().await;
        let queue = topics
            .get_mut(topic)
            .ok_or_else(|| MessagingError::topic_not_found(topic))?;

        let message = queue.messages.iter_mut().find(|message| {
            message
                .claim
                .as_ref()
                .map(|claim| claim.delivery_id == delivery_id)
                .unwrap_or(false)
        });

        match message {
            Some(message) => {
                message.claim = None;
                Ok(())
            }
            None => Err(MessagingError::acknowledge(
                topic,
                delivery_id,
                "unknown or superseded delivery",
            )),
        }
    }

    async fn topic_metrics(&self, topic: &str) -> MessagingResult<TopicMetrics> {
        let now = Instant::now();
        let topics = self.topics.lock().await;
        let mut metrics = TopicMetrics {
            topic: topic.to_string(),
            visible: 0,
            scheduled: 0,
            in_flight: 0,
            published_total: 0,
        };

        if let Some(queue) = topics.get(topic) {
            metrics.published_total = queue.published_total;
            for message in &queue.messages {
                if message.visible_at > now {
                    metrics.scheduled += 1;
                } else if message.is_available(now) {
                    metrics.visible += 1;
                } else {
                    metrics.in_flight += 1;
                }
            }
        }

        Ok(metrics)
    }
}
