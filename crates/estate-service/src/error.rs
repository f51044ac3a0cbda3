//! Request validation errors.

use estate_core::error::EstateError;
use estate_core::models::request::{Priority, RequestKind, RequestStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("pickup time must be in the future")]
    PickupInPast,

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("no SLA window configured for {kind} requests of {priority} priority")]
    MissingSlaWindow { kind: RequestKind, priority: Priority },

    #[error("request is closed with status {0}")]
    Terminal(RequestStatus),
}

impl RequestError {
    /// The input field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::TooLong { field, .. } => field,
            Self::PickupInPast => "pickup_time",
            Self::UnknownDestination(_) => "destination",
            Self::InvalidEmail(_) => "email",
            Self::MissingSlaWindow { .. } => "priority",
            Self::Terminal(_) => "status",
        }
    }
}

impl From<RequestError> for EstateError {
    fn from(err: RequestError) -> Self {
        EstateError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}
