//! # Pipeline Stages
//!
//! Each stage is a stateless reaction to one inbound message:
//!
//! ```text
//! upload ──▶ Extraction ──┬─▶ translate topic ──▶ Translation ──┐
//!                         └─▶ result topic (same language) ◀─────┘
//!                                   │
//!                                   ▼
//!                              Persistence ──(delayed)──▶ read topic ──▶ Retrieval ──▶ SMS / call
//! ```
//!
//! Stages hold only injected collaborators and configuration. They return an
//! explicit outcome or a [`PipelineError`](crate::error::PipelineError); the
//! host decides from the error whether the delivery is dropped or redelivered.
//! Delivery is at-least-once, so every stage must be safe to run twice for the
//! same input.

pub mod dedup;
pub mod extraction;
pub mod persistence;
pub mod retrieval;
pub mod translation;

pub use dedup::{
    notification_key, InMemoryNotificationLedger, NotificationClaim, NotificationLedger,
};
pub use extraction::{ExtractionOutcome, ExtractionStage};
pub use persistence::{PersistenceOutcome, PersistenceStage};
pub use retrieval::{ChannelStatus, NotificationReport, RetrievalOutcome, RetrievalStage};
pub use translation::{TranslationOutcome, TranslationStage};

use crate::error::PipelineResult;
use crate::messaging::{encode_payload, MessagePublisher};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Per-invocation data handed to a stage by its host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub delivery_id: String,
    /// 1 on first delivery
    pub attempt: u32,
    /// Collaborator calls, including retries, must finish before this instant
    pub deadline: Instant,
}

impl InvocationContext {
    pub fn new(delivery_id: impl Into<String>, attempt: u32, timeout: Duration) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            attempt,
            deadline: Instant::now() + timeout,
        }
    }

    /// Context for invoking a stage directly, outside any host
    pub fn detached(timeout: Duration) -> Self {
        Self::new(Uuid::new_v4().to_string(), 1, timeout)
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

/// Encode `payload` and publish it, optionally delayed
pub(crate) async fn publish_payload<T: Serialize>(
    publisher: &dyn MessagePublisher,
    topic: &str,
    payload: &T,
    attributes: HashMap<String, String>,
    delay: Option<Duration>,
) -> PipelineResult<String> {
    let mut message = encode_payload(payload)?;
    message.attributes.extend(attributes);

    let message_id = match delay {
        Some(delay) if !delay.is_zero() => {
            publisher.publish_delayed(topic, message, delay).await?
        }
        _ => publisher.publish(topic, message).await?,
    };
    Ok(message_id)
}
