//! Integration tests for the audit log, SLA policy store and
//! notification outbox using in-memory SurrealDB.

use chrono::{Duration, Utc};
use estate_core::error::EstateError;
use estate_core::models::audit::{ActorType, AuditAction, CreateAuditLogEntry};
use estate_core::models::notification::NotificationKind;
use estate_core::models::request::{Priority, RequestKind};
use estate_core::repository::{
    AuditLogFilter, AuditLogRepository, NotificationSink, Pagination, SlaPolicyRepository,
};
use estate_db::repository::{
    SurrealAuditLogRepository, SurrealNotificationOutbox, SurrealSlaPolicyRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    estate_db::run_migrations(&db).await.unwrap();
    db
}

fn entry(tenant_id: Uuid, action: AuditAction, offset: Duration) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id,
        actor_id: Uuid::nil(),
        actor_type: ActorType::System,
        action,
        resource_type: "service_request".into(),
        resource_id: Uuid::new_v4(),
        details: serde_json::json!({}),
        timestamp: Utc::now() + offset,
    }
}

#[tokio::test]
async fn audit_entries_are_listed_in_timestamp_order() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);
    let tenant_id = Uuid::new_v4();

    repo.append(entry(tenant_id, AuditAction::Escalated, Duration::seconds(10)))
        .await
        .unwrap();
    repo.append(entry(tenant_id, AuditAction::Created, Duration::zero()))
        .await
        .unwrap();
    repo.append(entry(Uuid::new_v4(), AuditAction::Created, Duration::zero()))
        .await
        .unwrap();

    let page = repo
        .list(tenant_id, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].action, AuditAction::Created);
    assert_eq!(page.items[1].action, AuditAction::Escalated);
    assert!(page.items.iter().all(|e| e.tenant_id == tenant_id));

    let escalations = repo
        .list(
            tenant_id,
            AuditLogFilter {
                action: Some(AuditAction::Escalated),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(escalations.total, 1);
    assert_eq!(escalations.items[0].actor_type, ActorType::System);
}

#[tokio::test]
async fn audit_entries_cannot_be_rewritten() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let written = repo
        .append(entry(tenant_id, AuditAction::Created, Duration::zero()))
        .await
        .unwrap();

    // READONLY fields reject the change.
    let result = db
        .query("UPDATE type::record('audit_log', $id) SET action = 'Escalated'")
        .bind(("id", written.id.to_string()))
        .await
        .unwrap();
    assert!(result.check().is_err());

    let page = repo
        .list(tenant_id, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.items[0].action, AuditAction::Created);
}

#[tokio::test]
async fn sla_window_upserts() {
    let db = setup().await;
    let repo = SurrealSlaPolicyRepository::new(db);
    let tenant_id = Uuid::new_v4();

    repo.set_window(tenant_id, RequestKind::Taxi, Priority::High, Duration::minutes(15))
        .await
        .unwrap();
    repo.set_window(tenant_id, RequestKind::Taxi, Priority::High, Duration::minutes(10))
        .await
        .unwrap();

    let window = repo
        .get_window(tenant_id, RequestKind::Taxi, Priority::High)
        .await
        .unwrap();
    assert_eq!(window, Duration::minutes(10));
    assert_eq!(repo.list(tenant_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unset_sla_window_is_not_found() {
    let db = setup().await;
    let repo = SurrealSlaPolicyRepository::new(db);

    let err = repo
        .get_window(Uuid::new_v4(), RequestKind::Contact, Priority::Low)
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::NotFound { .. }));
}

#[tokio::test]
async fn negative_sla_window_is_rejected() {
    let db = setup().await;
    let repo = SurrealSlaPolicyRepository::new(db);

    let err = repo
        .set_window(
            Uuid::new_v4(),
            RequestKind::Maintenance,
            Priority::Low,
            Duration::minutes(-1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::Validation { .. }));
}

#[tokio::test]
async fn outbox_deduplicates_by_key() {
    let db = setup().await;
    let outbox = SurrealNotificationOutbox::new(db);
    let tenant_id = Uuid::new_v4();

    for _ in 0..3 {
        outbox
            .notify(
                tenant_id,
                NotificationKind::Escalated,
                "escalation:abc:1",
                serde_json::json!({ "request_id": "abc" }),
            )
            .await
            .unwrap();
    }

    let pending = outbox.list(tenant_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, NotificationKind::Escalated);

    // Same key in another tenant is a separate notification.
    let other = Uuid::new_v4();
    outbox
        .notify(
            other,
            NotificationKind::Escalated,
            "escalation:abc:1",
            serde_json::json!({}),
        )
        .await
        .unwrap();
    assert_eq!(outbox.list(other).await.unwrap().len(), 1);
}
