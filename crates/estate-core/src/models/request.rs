//! Service request domain model.
//!
//! Maintenance tickets, taxi bookings and rental contact requests are
//! tagged variants of one [`ServiceRequest`]. They share identity,
//! assignment and escalation fields; what differs per kind lives in
//! [`RequestDetails`] and in the lifecycle tables of the service layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Maintenance,
    Taxi,
    Contact,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [Self::Maintenance, Self::Taxi, Self::Contact];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "Maintenance",
            Self::Taxi => "Taxi",
            Self::Contact => "Contact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Maintenance" => Some(Self::Maintenance),
            "Taxi" => Some(Self::Taxi),
            "Contact" => Some(Self::Contact),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of every kind's status set. Which subset applies to a request
/// is decided by its [`RequestKind`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Open,
    New,
    Pending,
    Assigned,
    InProgress,
    Resolved,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Statuses from which no further transition exists, for any kind.
    pub const TERMINAL: [RequestStatus; 3] = [Self::Resolved, Self::Completed, Self::Cancelled];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::New => "New",
            Self::Pending => "Pending",
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::Resolved => "Resolved",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Open" => Some(Self::Open),
            "New" => Some(Self::New),
            "Pending" => Some(Self::Pending),
            "Assigned" => Some(Self::Assigned),
            "InProgress" => Some(Self::InProgress),
            "Resolved" => Some(Self::Resolved),
            "Completed" => Some(Self::Completed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContactMethod {
    Email,
    Phone,
}

/// Kind-specific request payload. The variant determines the request kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum RequestDetails {
    Maintenance {
        title: String,
        description: String,
    },
    Taxi {
        pickup_location: String,
        destination: String,
        pickup_time: DateTime<Utc>,
    },
    /// Enquiry about a rental listing.
    Contact {
        name: String,
        contact_method: ContactMethod,
        email: Option<String>,
        phone: Option<String>,
        message: String,
    },
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Maintenance { .. } => RequestKind::Maintenance,
            Self::Taxi { .. } => RequestKind::Taxi,
            Self::Contact { .. } => RequestKind::Contact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub priority: Priority,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    /// Opaque unit or location reference.
    pub unit_ref: Option<String>,
    pub details: RequestDetails,
    /// Caller-supplied creation token, if any.
    pub idempotency_key: Option<String>,
    pub escalation_deadline: DateTime<Utc>,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    /// When the escalation notification was accepted by the dispatcher.
    pub escalation_notified_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token; bumped by every mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Caller input for creating a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    /// Defaults to [`Priority::Medium`].
    pub priority: Option<Priority>,
    pub unit_ref: Option<String>,
    pub details: RequestDetails,
    pub idempotency_key: Option<String>,
}

/// A fully-computed request ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: RequestStatus,
    pub priority: Priority,
    pub created_by: Uuid,
    pub unit_ref: Option<String>,
    pub details: RequestDetails,
    pub idempotency_key: Option<String>,
    pub escalation_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewServiceRequest {
    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }
}

/// Patch applied by a conditional write. `None` fields are left as-is;
/// `version` is always bumped and `updated_at` always replaced.
#[derive(Debug, Clone)]
pub struct RequestUpdate {
    pub status: Option<RequestStatus>,
    pub assigned_to: Option<Uuid>,
    pub escalation_deadline: Option<DateTime<Utc>>,
    /// `Some(t)` flips `escalated` to true with `escalated_at = t`.
    pub escalated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RequestUpdate {
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            assigned_to: None,
            escalation_deadline: None,
            escalated_at: None,
            updated_at,
        }
    }
}

/// Query filters for listing requests.
#[derive(Debug, Clone, Default)]
pub struct ServiceRequestFilter {
    pub kind: Option<RequestKind>,
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Uuid>,
    pub unit_ref: Option<String>,
    pub created_by: Option<Uuid>,
    pub escalated: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip() {
        for status in [
            RequestStatus::Open,
            RequestStatus::New,
            RequestStatus::Pending,
            RequestStatus::Assigned,
            RequestStatus::InProgress,
            RequestStatus::Resolved,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("resolved"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(RequestStatus::Resolved.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(!RequestStatus::Assigned.is_terminal());
        assert!(!RequestStatus::Open.is_terminal());
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn details_carry_their_kind_through_serde() {
        let details = RequestDetails::Maintenance {
            title: "Leaking tap".into(),
            description: "Kitchen tap drips constantly".into(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "Maintenance");

        let back: RequestDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), RequestKind::Maintenance);
        assert_eq!(back, details);
    }
}
