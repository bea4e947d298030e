//! Bus client traits.
//!
//! Stages only publish; the host only subscribes. Splitting the two lets a
//! stage be handed a publisher without gaining the ability to consume.

use crate::messaging::clients::types::{Delivery, TopicMetrics};
use crate::messaging::envelope::PubsubMessage;
use crate::messaging::errors::MessagingResult;
use async_trait::async_trait;
use std::time::Duration;

/// Publishing half of a message bus
///
/// Delivery is at-least-once with no ordering guarantee. Implementations
/// assign the `message_id` and `publish_time` of the stored message.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message, returning the bus-assigned message id
    async fn publish(&self, topic: &str, message: PubsubMessage) -> MessagingResult<String>;

    /// Publish a message that becomes visible to subscribers only after `delay`
    async fn publish_delayed(
        &self,
        topic: &str,
        message: PubsubMessage,
        delay: Duration,
    ) -> MessagingResult<String>;

    /// Client type for debugging/observability
    fn client_type(&self) -> &'static str;
}

/// Consuming half of a message bus
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Claim up to `limit` visible messages, hiding them for `visibility_timeout`
    async fn receive(
        &self,
        topic: &str,
        limit: usize,
        visibility_timeout: Duration,
    ) -> MessagingResult<Vec<Delivery>>;

    /// Acknowledge a delivery; the message will not be redelivered
    async fn ack(&self, topic: &str, delivery_id: &str) -> MessagingResult<()>;

    /// Negative-acknowledge a delivery; the message becomes visible again
    async fn nack(&self, topic: &str, delivery_id: &str) -> MessagingResult<()>;

    /// Queue depth for one topic, including delayed and in-flight messages
    async fn topic_metrics(&self, topic: &str) -> MessagingResult<TopicMetrics>;
}
