//! Shared types for bus clients.

use crate::messaging::envelope::PubsubMessage;
use serde::{Deserialize, Serialize};

/// A message handed to a subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Identifies this claim for ack/nack
    pub delivery_id: String,
    pub message: PubsubMessage,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: u32,
}

/// Point-in-time statistics for a single topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetrics {
    pub topic: String,
    /// Messages visible now
    pub visible: usize,
    /// Messages published with a delay that has not elapsed yet
    pub scheduled: usize,
    /// Messages claimed by a subscriber and not yet acked
    pub in_flight: usize,
    /// Total messages ever published to this topic
    pub published_total: u64,
}

impl TopicMetrics {
    /// Messages not yet acknowledged, in any state
    pub fn pending(&self) -> usize {
        self.visible + self.scheduled + self.in_flight
    }
}
