//! SurrealDB implementation of [`SlaPolicyRepository`].
//!
//! One record per `(tenant, kind, priority)`, keyed deterministically so
//! that `set_window` is an upsert.

use chrono::{DateTime, Duration, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::policy::SlaPolicy;
use estate_core::models::request::{Priority, RequestKind};
use estate_core::repository::SlaPolicyRepository;
use estate_core::tenancy::ensure_tenant;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct SlaPolicyRow {
    tenant_id: String,
    kind: String,
    priority: String,
    window_secs: u64,
    updated_at: DateTime<Utc>,
}

impl SlaPolicyRow {
    fn try_into_policy(self) -> Result<SlaPolicy, DbError> {
        let kind = RequestKind::parse(&self.kind)
            .ok_or_else(|| DbError::Decode(format!("unknown request kind: {}", self.kind)))?;
        let priority = Priority::parse(&self.priority)
            .ok_or_else(|| DbError::Decode(format!("unknown priority: {}", self.priority)))?;

        Ok(SlaPolicy {
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            kind,
            priority,
            window_secs: self.window_secs,
            updated_at: self.updated_at,
        })
    }
}

fn policy_key(tenant_id: Uuid, kind: RequestKind, priority: Priority) -> String {
    format!("{tenant_id}_{}_{}", kind.as_str(), priority.as_str())
}

/// SurrealDB implementation of the SLA policy settings store.
#[derive(Clone)]
pub struct SurrealSlaPolicyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSlaPolicyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SlaPolicyRepository for SurrealSlaPolicyRepository<C> {
    async fn set_window(
        &self,
        tenant_id: Uuid,
        kind: RequestKind,
        priority: Priority,
        window: Duration,
    ) -> EstateResult<SlaPolicy> {
        let window_secs = u64::try_from(window.num_seconds()).map_err(|_| {
            EstateError::validation("window", "SLA window must not be negative")
        })?;

        let result = self
            .db
            .query(
                "UPSERT type::record('sla_policy', $key) SET \
                 tenant_id = $tenant_id, kind = $kind, \
                 priority = $priority, window_secs = $window_secs, \
                 updated_at = time::now()",
            )
            .bind(("key", policy_key(tenant_id, kind, priority)))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("kind", kind.as_str().to_string()))
            .bind(("priority", priority.as_str().to_string()))
            .bind(("window_secs", window_secs))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SlaPolicyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "sla_policy".into(),
            id: format!("{kind}/{priority}"),
        })?;

        let policy = row.try_into_policy()?;
        ensure_tenant(tenant_id, &policy)?;
        Ok(policy)
    }

    async fn get_window(
        &self,
        tenant_id: Uuid,
        kind: RequestKind,
        priority: Priority,
    ) -> EstateResult<Duration> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('sla_policy', $key)")
            .bind(("key", policy_key(tenant_id, kind, priority)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SlaPolicyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "sla_policy".into(),
            id: format!("{kind}/{priority}"),
        })?;

        let policy = row.try_into_policy()?;
        ensure_tenant(tenant_id, &policy)?;
        Ok(policy.window())
    }

    async fn list(&self, tenant_id: Uuid) -> EstateResult<Vec<SlaPolicy>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM sla_policy \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY kind ASC, priority ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SlaPolicyRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(SlaPolicyRow::try_into_policy)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
