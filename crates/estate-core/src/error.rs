//! Error types for the service-request engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstateError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        kind: String,
        from: String,
        to: String,
    },

    #[error("Concurrent modification of {entity} {id}; re-read and retry")]
    Conflict { entity: String, id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Notification dispatch failed: {0}")]
    Notification(String),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EstateError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    /// Store, network and timeout failures. Everything else is a
    /// definitive answer about the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Notification(_) | Self::Timeout { .. }
        )
    }
}

pub type EstateResult<T> = Result<T, EstateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_the_edge() {
        let err = EstateError::InvalidTransition {
            kind: "Taxi".into(),
            from: "Assigned".into(),
            to: "Pending".into(),
        };
        assert_eq!(err.to_string(), "Invalid Taxi transition: Assigned -> Pending");
    }

    #[test]
    fn only_infrastructure_failures_are_transient() {
        assert!(EstateError::Database("down".into()).is_transient());
        assert!(
            EstateError::Timeout {
                operation: "assign".into()
            }
            .is_transient()
        );
        assert!(!EstateError::validation("title", "required").is_transient());
        assert!(
            !EstateError::Conflict {
                entity: "service_request".into(),
                id: "x".into()
            }
            .is_transient()
        );
    }
}
