//! # Messaging Error Types
//!
//! Error handling for the message bus layer using thiserror
//! for structured error types instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Message bus error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Publish failed: {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("Acknowledgement failed: {topic}: delivery {delivery_id}: {message}")]
    Acknowledge {
        topic: String,
        delivery_id: String,
        message: String,
    },

    #[error("Topic not found: {topic}")]
    TopicNotFound { topic: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Transport encoding error: {message}")]
    TransportEncoding { message: String },
}

impl MessagingError {
    /// Create a publish error
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create an acknowledgement error
    pub fn acknowledge(
        topic: impl Into<String>,
        delivery_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Acknowledge {
            topic: topic.into(),
            delivery_id: delivery_id.into(),
            message: message.into(),
        }
    }

    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        Self::TopicNotFound {
            topic: topic.into(),
        }
    }

    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    pub fn transport_encoding(message: impl Into<String>) -> Self {
        Self::TransportEncoding {
            message: message.into(),
        }
    }

    /// Malformed payloads never become valid on redelivery.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MessageSerialization { .. }
                | Self::MessageDeserialization { .. }
                | Self::TransportEncoding { .. }
        )
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            MessagingError::message_deserialization(err.to_string())
        } else {
            MessagingError::message_serialization(err.to_string())
        }
    }
}

impl From<base64::DecodeError> for MessagingError {
    fn from(err: base64::DecodeError) -> Self {
        MessagingError::transport_encoding(err.to_string())
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
