//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table is defined with `PERMISSIONS FOR update, delete NONE` and
//! every field is READONLY, so entries are immutable once written. This
//! repository only exposes append and list.

use chrono::{DateTime, Utc};
use estate_core::error::EstateResult;
use estate_core::models::audit::{ActorType, AuditAction, AuditLogEntry, CreateAuditLogEntry};
use estate_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    tenant_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    resource_type: String,
    resource_id: String,
    details: serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AuditLogRowWithId {
    record_id: String,
    tenant_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    resource_type: String,
    resource_id: String,
    details: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self, id: Uuid) -> Result<AuditLogEntry, DbError> {
        let actor_type = ActorType::parse(&self.actor_type)
            .ok_or_else(|| DbError::Decode(format!("unknown actor type: {}", self.actor_type)))?;
        let action = AuditAction::parse(&self.action)
            .ok_or_else(|| DbError::Decode(format!("unknown audit action: {}", self.action)))?;

        Ok(AuditLogEntry {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            actor_id: parse_uuid("actor", &self.actor_id)?,
            actor_type,
            action,
            resource_type: self.resource_type,
            resource_id: parse_uuid("resource", &self.resource_id)?,
            details: self.details,
            timestamp: self.timestamp,
        })
    }
}

impl AuditLogRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = parse_uuid("audit_log", &self.record_id)?;
        AuditLogRow {
            tenant_id: self.tenant_id,
            actor_id: self.actor_id,
            actor_type: self.actor_type,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: self.details,
            timestamp: self.timestamp,
        }
        .into_entry(id)
    }
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> EstateResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, actor_id = $actor_id, \
                 actor_type = $actor_type, action = $action, \
                 resource_type = $resource_type, \
                 resource_id = $resource_id, \
                 details = $details, timestamp = $timestamp",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("actor_type", input.actor_type.as_str().to_string()))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("resource_type", input.resource_type))
            .bind(("resource_id", input.resource_id.to_string()))
            .bind(("details", input.details))
            .bind(("timestamp", input.timestamp))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AuditLogRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> EstateResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        if filter.actor_id.is_some() {
            conditions.push("actor_id = $actor_id");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.resource_id.is_some() {
            conditions.push("resource_id = $resource_id");
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM audit_log \
             WHERE {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log \
             WHERE {where_clause} \
             ORDER BY timestamp ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action.as_str().to_string()));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditLogRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditLogRowWithId::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
