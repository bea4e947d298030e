//! Bus clients: the publisher/subscriber traits and an in-memory implementation.

pub mod in_memory_client;
pub mod traits;
pub mod types;

pub use in_memory_client::InMemoryBus;
pub use traits::{MessagePublisher, MessageSubscriber};
pub use types::{Delivery, TopicMetrics};
