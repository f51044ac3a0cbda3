//! SurrealDB implementation of [`ServiceRequestRepository`].
//!
//! Every mutation commits in one transaction with its audit entry. After
//! creation each one is a conditional `UPDATE ... WHERE version =
//! $expected_version`; when it matches nothing the transaction is
//! aborted, and a follow-up read tells a missing record, a foreign tenant
//! and a lost race apart.

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::audit::CreateAuditLogEntry;
use estate_core::models::request::{
    NewServiceRequest, Priority, RequestDetails, RequestKind, RequestStatus, RequestUpdate,
    ServiceRequest, ServiceRequestFilter,
};
use estate_core::repository::{PaginatedResult, Pagination, ServiceRequestRepository};
use estate_core::tenancy::ensure_tenant;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RequestRow {
    tenant_id: String,
    kind: String,
    status: String,
    priority: String,
    created_by: String,
    assigned_to: Option<String>,
    unit_ref: Option<String>,
    details: serde_json::Value,
    idempotency_key: Option<String>,
    escalation_deadline: DateTime<Utc>,
    escalated: bool,
    escalated_at: Option<DateTime<Utc>>,
    escalation_notified_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct RequestRowWithId {
    record_id: String,
    tenant_id: String,
    kind: String,
    status: String,
    priority: String,
    created_by: String,
    assigned_to: Option<String>,
    unit_ref: Option<String>,
    details: serde_json::Value,
    idempotency_key: Option<String>,
    escalation_deadline: DateTime<Utc>,
    escalated: bool,
    escalated_at: Option<DateTime<Utc>>,
    escalation_notified_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_request(self, id: Uuid) -> Result<ServiceRequest, DbError> {
        let kind = RequestKind::parse(&self.kind)
            .ok_or_else(|| DbError::Decode(format!("unknown request kind: {}", self.kind)))?;
        let status = RequestStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown request status: {}", self.status)))?;
        let priority = Priority::parse(&self.priority)
            .ok_or_else(|| DbError::Decode(format!("unknown priority: {}", self.priority)))?;
        let details: RequestDetails = serde_json::from_value(self.details)
            .map_err(|e| DbError::Decode(format!("invalid request details: {e}")))?;
        if details.kind() != kind {
            return Err(DbError::Decode(format!(
                "details of kind {} stored on a {kind} request",
                details.kind()
            )));
        }
        let assigned_to = self
            .assigned_to
            .as_deref()
            .map(|s| parse_uuid("assignee", s))
            .transpose()?;

        Ok(ServiceRequest {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            kind,
            status,
            priority,
            created_by: parse_uuid("creator", &self.created_by)?,
            assigned_to,
            unit_ref: self.unit_ref,
            details,
            idempotency_key: self.idempotency_key,
            escalation_deadline: self.escalation_deadline,
            escalated: self.escalated,
            escalated_at: self.escalated_at,
            escalation_notified_at: self.escalation_notified_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RequestRowWithId {
    fn try_into_request(self) -> Result<ServiceRequest, DbError> {
        let id = parse_uuid("service_request", &self.record_id)?;
        RequestRow {
            tenant_id: self.tenant_id,
            kind: self.kind,
            status: self.status,
            priority: self.priority,
            created_by: self.created_by,
            assigned_to: self.assigned_to,
            unit_ref: self.unit_ref,
            details: self.details,
            idempotency_key: self.idempotency_key,
            escalation_deadline: self.escalation_deadline,
            escalated: self.escalated,
            escalated_at: self.escalated_at,
            escalation_notified_at: self.escalation_notified_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_request(id)
    }
}

fn rows_into_requests(rows: Vec<RequestRowWithId>) -> Result<Vec<ServiceRequest>, DbError> {
    rows.into_iter()
        .map(RequestRowWithId::try_into_request)
        .collect()
}

/// `['Resolved', 'Completed', 'Cancelled']` as a SurrealQL array literal.
fn terminal_status_literal() -> String {
    let quoted: Vec<String> = RequestStatus::TERMINAL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Audit statement shared by every transactional write. Binds the
/// `$audit_*`, `$actor_*`, `$action`, `$resource_*` and `$timestamp`
/// parameters.
const CREATE_AUDIT_ENTRY: &str = "CREATE type::record('audit_log', $audit_id) SET \
     tenant_id = $audit_tenant_id, actor_id = $actor_id, \
     actor_type = $actor_type, action = $action, \
     resource_type = $resource_type, resource_id = $resource_id, \
     details = $audit_details, timestamp = $timestamp;";

/// SurrealDB implementation of the service request store.
#[derive(Clone)]
pub struct SurrealServiceRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Unscoped read; callers apply the tenant guard to the result.
    async fn fetch(&self, id: Uuid) -> EstateResult<ServiceRequest> {
        self.try_fetch(id).await?.ok_or_else(|| EstateError::NotFound {
            entity: "service_request".into(),
            id: id.to_string(),
        })
    }

    async fn try_fetch(&self, id: Uuid) -> EstateResult<Option<ServiceRequest>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('service_request', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_request(id)?)),
            None => Ok(None),
        }
    }
}

impl<C: Connection> ServiceRequestRepository for SurrealServiceRequestRepository<C> {
    async fn create_with_audit(
        &self,
        input: NewServiceRequest,
        audit: CreateAuditLogEntry,
    ) -> EstateResult<ServiceRequest> {
        let id = input.id;
        let details = serde_json::to_value(&input.details)
            .map_err(|e| EstateError::Internal(format!("cannot encode request details: {e}")))?;

        // Both records commit or neither does.
        let response = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 CREATE type::record('service_request', $id) SET \
                 tenant_id = $tenant_id, kind = $kind, status = $status, \
                 priority = $priority, created_by = $created_by, \
                 assigned_to = NONE, unit_ref = $unit_ref, \
                 details = $details, idempotency_key = $idempotency_key, \
                 escalation_deadline = $escalation_deadline, \
                 escalated = false, escalated_at = NONE, \
                 escalation_notified_at = NONE, version = 1, \
                 created_at = $created_at, updated_at = $created_at; \
                 {CREATE_AUDIT_ENTRY} \
                 COMMIT TRANSACTION;"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("kind", input.kind().as_str().to_string()))
            .bind(("status", input.status.as_str().to_string()))
            .bind(("priority", input.priority.as_str().to_string()))
            .bind(("created_by", input.created_by.to_string()))
            .bind(("unit_ref", input.unit_ref))
            .bind(("details", details))
            .bind(("idempotency_key", input.idempotency_key))
            .bind(("escalation_deadline", input.escalation_deadline))
            .bind(("created_at", input.created_at))
            .bind(("audit_id", Uuid::new_v4().to_string()))
            .bind(("audit_tenant_id", audit.tenant_id.to_string()))
            .bind(("actor_id", audit.actor_id.to_string()))
            .bind(("actor_type", audit.actor_type.as_str().to_string()))
            .bind(("action", audit.action.as_str().to_string()))
            .bind(("resource_type", audit.resource_type))
            .bind(("resource_id", audit.resource_id.to_string()))
            .bind(("audit_details", audit.details))
            .bind(("timestamp", audit.timestamp))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = response.check() {
            // A taken id is the idempotent-retry case, not a failure.
            if self.try_fetch(id).await?.is_some() {
                return Err(EstateError::AlreadyExists {
                    entity: "service_request".into(),
                    id: id.to_string(),
                });
            }
            return Err(DbError::Query(e.to_string()).into());
        }

        self.fetch(id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> EstateResult<ServiceRequest> {
        let request = self.fetch(id).await?;
        ensure_tenant(tenant_id, &request)?;
        Ok(request)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: ServiceRequestFilter,
        pagination: Pagination,
    ) -> EstateResult<PaginatedResult<ServiceRequest>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        if filter.kind.is_some() {
            conditions.push("kind = $kind");
        }
        if filter.status.is_some() {
            conditions.push("status = $status");
        }
        if filter.priority.is_some() {
            conditions.push("priority = $priority");
        }
        if filter.assigned_to.is_some() {
            conditions.push("assigned_to = $assigned_to");
        }
        if filter.unit_ref.is_some() {
            conditions.push("unit_ref = $unit_ref");
        }
        if filter.created_by.is_some() {
            conditions.push("created_by = $created_by");
        }
        if filter.escalated.is_some() {
            conditions.push("escalated = $escalated");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM service_request \
             WHERE {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM service_request \
             WHERE {where_clause} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(kind) = filter.kind {
            builder = builder.bind(("kind", kind.as_str().to_string()));
        }
        if let Some(status) = filter.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            builder = builder.bind(("priority", priority.as_str().to_string()));
        }
        if let Some(assigned_to) = filter.assigned_to {
            builder = builder.bind(("assigned_to", assigned_to.to_string()));
        }
        if let Some(unit_ref) = filter.unit_ref {
            builder = builder.bind(("unit_ref", unit_ref));
        }
        if let Some(created_by) = filter.created_by {
            builder = builder.bind(("created_by", created_by.to_string()));
        }
        if let Some(escalated) = filter.escalated {
            builder = builder.bind(("escalated", escalated));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        // Statement 0 is the count, statement 1 the page.
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<RequestRowWithId> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_requests(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_overdue(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        limit: u64,
    ) -> EstateResult<Vec<ServiceRequest>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM service_request \
             WHERE tenant_id = $tenant_id \
             AND escalated = false \
             AND status NOT IN {} \
             AND escalation_deadline <= $now \
             ORDER BY escalation_deadline ASC \
             LIMIT $limit",
            terminal_status_literal()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("now", now))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_requests(rows)?)
    }

    async fn list_unnotified_escalations(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> EstateResult<Vec<ServiceRequest>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM service_request \
                 WHERE tenant_id = $tenant_id \
                 AND escalated = true \
                 AND escalation_notified_at = NONE \
                 ORDER BY escalated_at ASC \
                 LIMIT $limit",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_requests(rows)?)
    }

    async fn update_if_version_with_audit(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: u64,
        update: RequestUpdate,
        audit: CreateAuditLogEntry,
    ) -> EstateResult<ServiceRequest> {
        let mut sets = Vec::new();
        if update.status.is_some() {
            sets.push("status = $status");
        }
        if update.assigned_to.is_some() {
            sets.push("assigned_to = $assigned_to");
        }
        if update.escalation_deadline.is_some() {
            sets.push("escalation_deadline = $escalation_deadline");
        }
        if update.escalated_at.is_some() {
            sets.push("escalated = true");
            sets.push("escalated_at = $escalated_at");
        }
        sets.push("version = $next_version");
        sets.push("updated_at = $updated_at");

        // A failed precondition throws so the audit entry is never
        // written on its own.
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $updated = (UPDATE type::record('service_request', $id) \
             SET {} \
             WHERE tenant_id = $tenant_id AND version = $expected_version); \
             IF array::len($updated) = 0 {{ THROW 'version precondition failed' }}; \
             {CREATE_AUDIT_ENTRY} \
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("expected_version", expected_version))
            .bind(("next_version", expected_version + 1))
            .bind(("updated_at", update.updated_at))
            .bind(("audit_id", Uuid::new_v4().to_string()))
            .bind(("audit_tenant_id", audit.tenant_id.to_string()))
            .bind(("actor_id", audit.actor_id.to_string()))
            .bind(("actor_type", audit.actor_type.as_str().to_string()))
            .bind(("action", audit.action.as_str().to_string()))
            .bind(("resource_type", audit.resource_type))
            .bind(("resource_id", audit.resource_id.to_string()))
            .bind(("audit_details", audit.details))
            .bind(("timestamp", audit.timestamp));

        if let Some(status) = update.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(assigned_to) = update.assigned_to {
            builder = builder.bind(("assigned_to", assigned_to.to_string()));
        }
        if let Some(deadline) = update.escalation_deadline {
            builder = builder.bind(("escalation_deadline", deadline));
        }
        if let Some(escalated_at) = update.escalated_at {
            builder = builder.bind(("escalated_at", escalated_at));
        }

        let response = builder.await.map_err(DbError::from)?;
        let failure = match response.check() {
            Ok(_) => return self.fetch(id).await,
            Err(e) => e,
        };

        // Nothing committed: find out why.
        let current = self.fetch(id).await?;
        ensure_tenant(tenant_id, &current)?;
        if current.version == expected_version {
            Err(DbError::Query(failure.to_string()).into())
        } else {
            Err(EstateError::Conflict {
                entity: "service_request".into(),
                id: id.to_string(),
            })
        }
    }

    async fn mark_escalation_notified(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> EstateResult<()> {
        let current = self.fetch(id).await?;
        ensure_tenant(tenant_id, &current)?;

        self.db
            .query(
                "UPDATE type::record('service_request', $id) SET \
                 escalation_notified_at = $at \
                 WHERE tenant_id = $tenant_id AND escalated = true",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }
}
