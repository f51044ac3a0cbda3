//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter and reject records of any other
//! tenant with `AuthorizationDenied`. No operation queries across
//! tenants.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::EstateResult;
use crate::models::{
    audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry},
    notification::NotificationKind,
    policy::SlaPolicy,
    request::{
        NewServiceRequest, Priority, RequestKind, RequestUpdate, ServiceRequest,
        ServiceRequestFilter,
    },
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant registry (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = EstateResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = EstateResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = EstateResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = EstateResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = EstateResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = EstateResult<User>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = EstateResult<PaginatedResult<User>>> + Send;
}

pub trait ServiceRequestRepository: Send + Sync {
    /// Persist a new request together with its `Created` audit entry in
    /// one transaction. Fails with `AlreadyExists` if the id is taken.
    fn create_with_audit(
        &self,
        input: NewServiceRequest,
        audit: CreateAuditLogEntry,
    ) -> impl Future<Output = EstateResult<ServiceRequest>> + Send;

    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = EstateResult<ServiceRequest>> + Send;

    fn list(
        &self,
        tenant_id: Uuid,
        filter: ServiceRequestFilter,
        pagination: Pagination,
    ) -> impl Future<Output = EstateResult<PaginatedResult<ServiceRequest>>> + Send;

    /// Non-terminal, unescalated requests with `escalation_deadline <= now`,
    /// oldest deadline first.
    fn list_overdue(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        limit: u64,
    ) -> impl Future<Output = EstateResult<Vec<ServiceRequest>>> + Send;

    /// Escalated requests whose escalation notification was never
    /// acknowledged by the dispatcher.
    fn list_unnotified_escalations(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = EstateResult<Vec<ServiceRequest>>> + Send;

    /// Compare-and-set write: applies `update` only if the stored version
    /// still equals `expected_version`, bumping the version by one, and
    /// appends `audit` in the same transaction. Either both commit or
    /// neither does.
    ///
    /// Fails with `Conflict` when the precondition does not hold,
    /// `NotFound` when the record does not exist.
    fn update_if_version_with_audit(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        update: RequestUpdate,
        audit: CreateAuditLogEntry,
    ) -> impl Future<Output = EstateResult<ServiceRequest>> + Send;

    /// Delivery bookkeeping only; does not bump the version.
    fn mark_escalation_notified(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = EstateResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = EstateResult<AuditLogEntry>> + Send;
    /// Entries in timestamp order.
    fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = EstateResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Collaborators: SLA policy settings and notification dispatch
// ---------------------------------------------------------------------------

pub trait SlaPolicyRepository: Send + Sync {
    /// Insert or replace the window for `(kind, priority)`.
    fn set_window(
        &self,
        tenant_id: Uuid,
        kind: RequestKind,
        priority: Priority,
        window: Duration,
    ) -> impl Future<Output = EstateResult<SlaPolicy>> + Send;
    /// Fails with `NotFound` when the tenant has not configured the pair.
    fn get_window(
        &self,
        tenant_id: Uuid,
        kind: RequestKind,
        priority: Priority,
    ) -> impl Future<Output = EstateResult<Duration>> + Send;
    fn list(&self, tenant_id: Uuid) -> impl Future<Output = EstateResult<Vec<SlaPolicy>>> + Send;
}

/// Hand-off point to the external notification dispatcher.
///
/// Implementations must treat a repeated `idempotency_key` within a tenant
/// as already delivered and return `Ok`.
pub trait NotificationSink: Send + Sync {
    fn notify(
        &self,
        tenant_id: Uuid,
        kind: NotificationKind,
        idempotency_key: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = EstateResult<()>> + Send;
}
