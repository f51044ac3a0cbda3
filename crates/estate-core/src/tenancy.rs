//! Tenant isolation guard.
//!
//! A pure predicate applied at the boundary of every store access and
//! every command. A tenant mismatch is always rejected with
//! [`EstateError::AuthorizationDenied`]; it is never turned into an empty
//! result or a `NotFound`.

use uuid::Uuid;

use crate::error::{EstateError, EstateResult};
use crate::models::audit::AuditLogEntry;
use crate::models::policy::SlaPolicy;
use crate::models::request::ServiceRequest;
use crate::models::user::User;

/// Entities that carry an immutable owning tenant.
pub trait TenantScoped {
    const ENTITY: &'static str;

    fn tenant_id(&self) -> Uuid;
    fn entity_id(&self) -> String;
}

/// Reject access to `entity` from any tenant other than `acting_tenant`.
pub fn ensure_tenant<T: TenantScoped>(acting_tenant: Uuid, entity: &T) -> EstateResult<()> {
    if entity.tenant_id() == acting_tenant {
        Ok(())
    } else {
        Err(EstateError::denied(format!(
            "{} {} belongs to another tenant",
            T::ENTITY,
            entity.entity_id()
        )))
    }
}

impl TenantScoped for ServiceRequest {
    const ENTITY: &'static str = "service_request";

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl TenantScoped for User {
    const ENTITY: &'static str = "user";

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl TenantScoped for AuditLogEntry {
    const ENTITY: &'static str = "audit_log";

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl TenantScoped for SlaPolicy {
    const ENTITY: &'static str = "sla_policy";

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn entity_id(&self) -> String {
        format!("{}/{}", self.kind, self.priority)
    }
}
