//! Error types for the pipeline.
//!
//! Stages return [`PipelineResult`]. The host uses [`PipelineError::disposition`]
//! to decide whether a failed delivery is dropped or handed back to the bus.

use crate::collaborators::CollaboratorError;
use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Collaborator error: {0}")]
    CollaboratorError(#[from] CollaboratorError),
    #[error("Notification error: {0}")]
    NotificationError(String),
    #[error("Messaging error: {0}")]
    MessagingError(#[from] MessagingError),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// What the host does with a delivery whose handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Permanent failure: acknowledge and drop, redelivery cannot help
    Drop,
    /// Transient failure: leave the message for the bus to redeliver
    Redeliver,
}

impl PipelineError {
    /// Build a validation error for a required field absent from a payload
    pub fn missing_field(field: &str, payload: &str) -> Self {
        PipelineError::ValidationError(format!(
            "{field} not provided. Make sure you have a \"{field}\" property in your {payload}"
        ))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ValidationError(_) | PipelineError::ConfigurationError(_) => false,
            PipelineError::MessagingError(err) => err.is_retryable(),
            PipelineError::CollaboratorError(_)
            | PipelineError::NotificationError(_)
            | PipelineError::Timeout(_) => true,
        }
    }

    pub fn disposition(&self) -> ErrorDisposition {
        if self.is_retryable() {
            ErrorDisposition::Redeliver
        } else {
            ErrorDisposition::Drop
        }
    }

    /// Short machine-readable category for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::ValidationError(_) => "validation",
            PipelineError::CollaboratorError(_) => "collaborator",
            PipelineError::NotificationError(_) => "notification",
            PipelineError::MessagingError(_) => "messaging",
            PipelineError::ConfigurationError(_) => "configuration",
            PipelineError::Timeout(_) => "timeout",
        }
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(error: ConfigurationError) -> Self {
        PipelineError::ConfigurationError(error.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
