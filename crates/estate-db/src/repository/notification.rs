//! Notification outbox backed by SurrealDB.
//!
//! Accepted notifications are written to the `notification` table, from
//! which an external dispatcher delivers them. The record id is derived
//! from `(tenant, idempotency_key)`, so a repeated key is a no-op.

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::notification::{Notification, NotificationKind};
use estate_core::repository::NotificationSink;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct NotificationRowWithId {
    record_id: String,
    tenant_id: String,
    event_kind: String,
    idempotency_key: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl NotificationRowWithId {
    fn try_into_notification(self) -> Result<Notification, DbError> {
        let kind = NotificationKind::parse(&self.event_kind).ok_or_else(|| {
            DbError::Decode(format!("unknown notification kind: {}", self.event_kind))
        })?;

        Ok(Notification {
            id: parse_uuid("notification", &self.record_id)?,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            kind,
            idempotency_key: self.idempotency_key,
            payload: self.payload,
            created_at: self.created_at,
        })
    }
}

fn notification_id(tenant_id: Uuid, idempotency_key: &str) -> Uuid {
    Uuid::new_v5(&tenant_id, idempotency_key.as_bytes())
}

/// SurrealDB-backed [`NotificationSink`].
#[derive(Clone)]
pub struct SurrealNotificationOutbox<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealNotificationOutbox<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn exists(&self, id: Uuid) -> EstateResult<bool> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('notification', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<NotificationRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    /// Pending notifications of one tenant in acceptance order.
    pub async fn list(&self, tenant_id: Uuid) -> EstateResult<Vec<Notification>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM notification \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<NotificationRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(NotificationRowWithId::try_into_notification)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}

impl<C: Connection> NotificationSink for SurrealNotificationOutbox<C> {
    async fn notify(
        &self,
        tenant_id: Uuid,
        kind: NotificationKind,
        idempotency_key: &str,
        payload: serde_json::Value,
    ) -> EstateResult<()> {
        let id = notification_id(tenant_id, idempotency_key);

        let result = self
            .db
            .query(
                "CREATE type::record('notification', $id) SET \
                 tenant_id = $tenant_id, event_kind = $event_kind, \
                 idempotency_key = $idempotency_key, payload = $payload",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("event_kind", kind.as_str().to_string()))
            .bind(("idempotency_key", idempotency_key.to_string()))
            .bind(("payload", payload))
            .await
            .map_err(|e| EstateError::Notification(e.to_string()))?;

        if let Err(e) = result.check() {
            if self.exists(id).await? {
                debug!(%tenant_id, idempotency_key, "Notification already accepted");
                return Ok(());
            }
            return Err(EstateError::Notification(e.to_string()));
        }

        debug!(%tenant_id, %kind, idempotency_key, "Notification accepted");
        Ok(())
    }
}
