//! Outbound notification events handed to the external dispatcher.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationKind {
    /// A request breached its SLA window.
    Escalated,
    /// A request was bound to a new assignee.
    Assigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalated => "Escalated",
            Self::Assigned => "Assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Escalated" => Some(Self::Escalated),
            "Assigned" => Some(Self::Assigned),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification accepted by the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: NotificationKind,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Idempotency key of the escalation notification for a request.
///
/// Derived from the request and its deadline, not from wall-clock time,
/// so every worker that escalates the same breach produces the same key.
pub fn escalation_key(request_id: Uuid, deadline: DateTime<Utc>) -> String {
    format!("escalation:{request_id}:{}", deadline.timestamp_millis())
}

/// Idempotency key of the assignment notification for one version of a
/// request.
pub fn assignment_key(request_id: Uuid, version: u64) -> String {
    format!("assigned:{request_id}:{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_key_is_stable_per_deadline() {
        let id = Uuid::new_v4();
        let deadline = Utc::now();
        assert_eq!(escalation_key(id, deadline), escalation_key(id, deadline));
        assert_ne!(
            escalation_key(id, deadline),
            escalation_key(id, deadline + chrono::Duration::minutes(5))
        );
    }
}
