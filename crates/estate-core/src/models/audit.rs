//! Audit log domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorType {
    User,
    /// Background work such as the escalation monitor.
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::System => "System",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(Self::User),
            "System" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Created,
    Assigned,
    StatusChanged,
    Escalated,
    Rescheduled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Assigned => "Assigned",
            Self::StatusChanged => "StatusChanged",
            Self::Escalated => "Escalated",
            Self::Rescheduled => "Rescheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Created" => Some(Self::Created),
            "Assigned" => Some(Self::Assigned),
            "StatusChanged" => Some(Self::StatusChanged),
            "Escalated" => Some(Self::Escalated),
            "Rescheduled" => Some(Self::Rescheduled),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record. Retries of the same mutation can be
/// recognised by `(resource_id, action, timestamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `Uuid::nil()` for [`ActorType::System`].
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
