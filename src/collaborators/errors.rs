//! # Collaborator Error Types
//!
//! Failures reported by the external services the stages call (OCR, language
//! detection, translation, blob storage, notification delivery).

use thiserror::Error;

/// Errors raised by external collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("{collaborator}: resource not found: {resource}")]
    NotFound {
        collaborator: String,
        resource: String,
    },

    #[error("{collaborator}: service unavailable: {message}")]
    Unavailable {
        collaborator: String,
        message: String,
    },

    #[error("{collaborator}: request rejected: {message}")]
    Rejected {
        collaborator: String,
        message: String,
    },

    #[error("{collaborator}: call timed out after {timeout_ms}ms")]
    Timeout { collaborator: String, timeout_ms: u64 },
}

impl CollaboratorError {
    pub fn not_found(collaborator: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::NotFound {
            collaborator: collaborator.into(),
            resource: resource.into(),
        }
    }

    pub fn unavailable(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn rejected(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn timeout(collaborator: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            collaborator: collaborator.into(),
            timeout_ms,
        }
    }

    /// Name of the collaborator that produced this error
    pub fn collaborator(&self) -> &str {
        match self {
            Self::NotFound { collaborator, .. }
            | Self::Unavailable { collaborator, .. }
            | Self::Rejected { collaborator, .. }
            | Self::Timeout { collaborator, .. } => collaborator,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::not_found("blob_store", "results/a.jpg_to_en.txt");
        let display = format!("{err}");
        assert!(display.contains("blob_store"));
        assert!(display.contains("a.jpg_to_en.txt"));
        assert!(err.is_not_found());
        assert_eq!(err.collaborator(), "blob_store");
    }

    #[test]
    fn test_timeout_is_not_not_found() {
        let err = CollaboratorError::timeout("translator", 1500);
        assert!(!err.is_not_found());
        assert!(format!("{err}").contains("1500ms"));
    }
}
