//! Audit logger for request mutations.
//!
//! Every committed mutation gets exactly one entry, written in the same
//! transaction as the mutation itself. The entry's timestamp is the
//! request's `updated_at` for that mutation, which never decreases, so a
//! request's history reads in order.

use chrono::{DateTime, Utc};
use estate_core::error::EstateResult;
use estate_core::models::audit::{ActorType, AuditAction, AuditLogEntry, CreateAuditLogEntry};
use estate_core::models::principal::Principal;
use estate_core::models::request::{NewServiceRequest, ServiceRequest};
use estate_core::repository::{AuditLogFilter, AuditLogRepository, Pagination};
use uuid::Uuid;

pub const RESOURCE_TYPE: &str = "service_request";

/// Who performed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    System,
}

impl Actor {
    pub fn id(&self) -> Uuid {
        match self {
            Self::User(id) => *id,
            Self::System => Uuid::nil(),
        }
    }

    pub fn actor_type(&self) -> ActorType {
        match self {
            Self::User(_) => ActorType::User,
            Self::System => ActorType::System,
        }
    }
}

impl From<&Principal> for Actor {
    fn from(principal: &Principal) -> Self {
        Self::User(principal.user_id)
    }
}

/// The `Created` entry, committed together with the request itself.
pub fn created_entry(request: &NewServiceRequest, actor: Actor) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: request.tenant_id,
        actor_id: actor.id(),
        actor_type: actor.actor_type(),
        action: AuditAction::Created,
        resource_type: RESOURCE_TYPE.into(),
        resource_id: request.id,
        details: serde_json::json!({
            "kind": request.kind().as_str(),
            "status": request.status.as_str(),
            "priority": request.priority.as_str(),
            "escalation_deadline": request.escalation_deadline,
        }),
        timestamp: request.created_at,
    }
}

/// The entry committed together with a mutation of `current`.
///
/// `at` is the mutation's `updated_at`, so the entry and the row it
/// describes carry the same timestamp.
pub fn mutation_entry(
    current: &ServiceRequest,
    actor: Actor,
    action: AuditAction,
    details: serde_json::Value,
    at: DateTime<Utc>,
) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: current.tenant_id,
        actor_id: actor.id(),
        actor_type: actor.actor_type(),
        action,
        resource_type: RESOURCE_TYPE.into(),
        resource_id: current.id,
        details,
        timestamp: at,
    }
}

pub struct AuditLogger<A: AuditLogRepository> {
    repo: A,
}

impl<A: AuditLogRepository> AuditLogger<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    /// The full history of one request, oldest first.
    pub async fn history(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
    ) -> EstateResult<Vec<AuditLogEntry>> {
        let filter = AuditLogFilter {
            resource_id: Some(request_id),
            ..Default::default()
        };
        let mut pagination = Pagination::default();
        let mut entries = Vec::new();

        loop {
            let page = self
                .repo
                .list(tenant_id, filter.clone(), pagination.clone())
                .await?;
            let fetched = page.items.len() as u64;
            entries.extend(page.items);
            pagination.offset += fetched;
            if fetched == 0 || pagination.offset >= page.total {
                break;
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_actor_has_nil_id() {
        assert_eq!(Actor::System.id(), Uuid::nil());
        assert_eq!(Actor::System.actor_type(), ActorType::System);

        let user = Uuid::new_v4();
        assert_eq!(Actor::User(user).id(), user);
    }
}
