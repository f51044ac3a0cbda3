//! Integration tests for the service request repository using in-memory
//! SurrealDB.

use chrono::{Duration, Utc};
use estate_core::error::EstateError;
use estate_core::models::audit::{ActorType, AuditAction, CreateAuditLogEntry};
use estate_core::models::request::{
    NewServiceRequest, Priority, RequestDetails, RequestKind, RequestStatus, RequestUpdate,
    ServiceRequest, ServiceRequestFilter,
};
use estate_core::repository::{
    AuditLogFilter, AuditLogRepository, Pagination, ServiceRequestRepository,
};
use estate_db::repository::{SurrealAuditLogRepository, SurrealServiceRequestRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    estate_db::run_migrations(&db).await.unwrap();
    db
}

fn maintenance(tenant_id: Uuid, deadline_in: Duration) -> NewServiceRequest {
    let now = Utc::now();
    NewServiceRequest {
        id: Uuid::new_v4(),
        tenant_id,
        status: RequestStatus::Open,
        priority: Priority::High,
        created_by: Uuid::new_v4(),
        unit_ref: Some("4B".into()),
        details: RequestDetails::Maintenance {
            title: "Leaking tap".into(),
            description: "Kitchen tap drips all night".into(),
        },
        idempotency_key: None,
        escalation_deadline: now + deadline_in,
        created_at: now,
    }
}

fn created_entry(input: &NewServiceRequest) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: input.tenant_id,
        actor_id: input.created_by,
        actor_type: ActorType::User,
        action: AuditAction::Created,
        resource_type: "service_request".into(),
        resource_id: input.id,
        details: serde_json::json!({ "kind": input.kind().as_str() }),
        timestamp: input.created_at,
    }
}

fn change_entry(request: &ServiceRequest, action: AuditAction) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: request.tenant_id,
        actor_id: Uuid::new_v4(),
        actor_type: ActorType::User,
        action,
        resource_type: "service_request".into(),
        resource_id: request.id,
        details: serde_json::json!({}),
        timestamp: Utc::now(),
    }
}

async fn audit_actions(db: &Surreal<Db>, tenant_id: Uuid, request_id: Uuid) -> Vec<AuditAction> {
    SurrealAuditLogRepository::new(db.clone())
        .list(
            tenant_id,
            AuditLogFilter {
                resource_id: Some(request_id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|e| e.action)
        .collect()
}

#[tokio::test]
async fn create_persists_request_and_audit_entry() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    assert_eq!(created.kind, RequestKind::Maintenance);
    assert_eq!(created.status, RequestStatus::Open);
    assert_eq!(created.version, 1);
    assert!(!created.escalated);
    assert!(created.assigned_to.is_none());

    let fetched = repo.get_by_id(tenant_id, created.id).await.unwrap();
    assert_eq!(fetched.details, created.details);

    let entries = audit
        .list(
            tenant_id,
            AuditLogFilter {
                resource_id: Some(created.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 1);
    assert_eq!(entries.items[0].action, AuditAction::Created);
}

#[tokio::test]
async fn duplicate_id_is_already_exists_and_writes_no_audit() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    repo.create_with_audit(input.clone(), entry.clone())
        .await
        .unwrap();

    let err = repo.create_with_audit(input, entry).await.unwrap_err();
    assert!(matches!(err, EstateError::AlreadyExists { .. }));

    let entries = audit
        .list(tenant_id, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(entries.total, 1);
}

#[tokio::test]
async fn taxi_details_survive_storage() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_id = Uuid::new_v4();

    let pickup_time = Utc::now() + Duration::hours(2);
    let mut input = maintenance(tenant_id, Duration::minutes(30));
    input.status = RequestStatus::Pending;
    input.details = RequestDetails::Taxi {
        pickup_location: "Block C lobby".into(),
        destination: "Airport".into(),
        pickup_time,
    };
    let entry = created_entry(&input);

    let created = repo.create_with_audit(input, entry).await.unwrap();
    assert_eq!(created.kind, RequestKind::Taxi);
    match created.details {
        RequestDetails::Taxi { destination, .. } => assert_eq!(destination, "Airport"),
        other => panic!("unexpected details: {other:?}"),
    }
}

#[tokio::test]
async fn cross_tenant_read_is_denied() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    let err = repo
        .get_by_id(Uuid::new_v4(), created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::AuthorizationDenied { .. }));
}

#[tokio::test]
async fn update_commits_with_its_audit_entry() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    let assignee = Uuid::new_v4();
    let updated = repo
        .update_if_version_with_audit(
            tenant_id,
            created.id,
            created.version,
            RequestUpdate {
                assigned_to: Some(assignee),
                ..RequestUpdate::at(Utc::now())
            },
            change_entry(&created, AuditAction::Assigned),
        )
        .await
        .unwrap();

    assert_eq!(updated.version, created.version + 1);
    assert_eq!(updated.assigned_to, Some(assignee));
    assert_eq!(updated.status, RequestStatus::Open);
    assert_eq!(
        audit_actions(&db, tenant_id, created.id).await,
        vec![AuditAction::Created, AuditAction::Assigned]
    );
}

#[tokio::test]
async fn stale_version_is_conflict_and_writes_no_audit() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    repo.update_if_version_with_audit(
        tenant_id,
        created.id,
        created.version,
        RequestUpdate {
            status: Some(RequestStatus::InProgress),
            ..RequestUpdate::at(Utc::now())
        },
        change_entry(&created, AuditAction::StatusChanged),
    )
    .await
    .unwrap();

    let err = repo
        .update_if_version_with_audit(
            tenant_id,
            created.id,
            created.version,
            RequestUpdate {
                status: Some(RequestStatus::Resolved),
                ..RequestUpdate::at(Utc::now())
            },
            change_entry(&created, AuditAction::StatusChanged),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::Conflict { .. }));

    let current = repo.get_by_id(tenant_id, created.id).await.unwrap();
    assert_eq!(current.status, RequestStatus::InProgress);
    assert_eq!(
        audit_actions(&db, tenant_id, created.id).await,
        vec![AuditAction::Created, AuditAction::StatusChanged]
    );
}

#[tokio::test]
async fn rejected_audit_entry_rolls_back_update() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    // The audit table now refuses every entry but `Created`.
    db.query(
        "DEFINE FIELD OVERWRITE action ON TABLE audit_log TYPE string READONLY \
         ASSERT $value = 'Created';",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let err = repo
        .update_if_version_with_audit(
            tenant_id,
            created.id,
            created.version,
            RequestUpdate {
                status: Some(RequestStatus::InProgress),
                ..RequestUpdate::at(Utc::now())
            },
            change_entry(&created, AuditAction::StatusChanged),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::Database(_)));

    let current = repo.get_by_id(tenant_id, created.id).await.unwrap();
    assert_eq!(current.version, created.version);
    assert_eq!(current.status, RequestStatus::Open);
    assert_eq!(
        audit_actions(&db, tenant_id, created.id).await,
        vec![AuditAction::Created]
    );
}

#[tokio::test]
async fn update_from_other_tenant_is_denied() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let input = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&input);
    let created = repo.create_with_audit(input, entry).await.unwrap();

    let err = repo
        .update_if_version_with_audit(
            Uuid::new_v4(),
            created.id,
            created.version,
            RequestUpdate {
                status: Some(RequestStatus::Resolved),
                ..RequestUpdate::at(Utc::now())
            },
            change_entry(&created, AuditAction::StatusChanged),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::AuthorizationDenied { .. }));
    assert_eq!(
        audit_actions(&db, tenant_id, created.id).await,
        vec![AuditAction::Created]
    );
}

#[tokio::test]
async fn update_missing_request_is_not_found() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_id = Uuid::new_v4();

    // Never stored.
    let missing = maintenance(tenant_id, Duration::hours(4));
    let entry = created_entry(&missing);

    let err = repo
        .update_if_version_with_audit(
            tenant_id,
            missing.id,
            1,
            RequestUpdate::at(Utc::now()),
            CreateAuditLogEntry {
                action: AuditAction::StatusChanged,
                ..entry
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::NotFound { .. }));
}

#[tokio::test]
async fn list_overdue_skips_terminal_and_escalated() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_id = Uuid::new_v4();
    let now = Utc::now();

    let mut ids = Vec::new();
    for offset in [Duration::hours(-2), Duration::hours(-1), Duration::hours(3)] {
        let input = maintenance(tenant_id, offset);
        let entry = created_entry(&input);
        ids.push(repo.create_with_audit(input, entry).await.unwrap());
    }

    // The oldest breach is resolved, so only the second is overdue.
    repo.update_if_version_with_audit(
        tenant_id,
        ids[0].id,
        ids[0].version,
        RequestUpdate {
            status: Some(RequestStatus::Resolved),
            ..RequestUpdate::at(now)
        },
        change_entry(&ids[0], AuditAction::StatusChanged),
    )
    .await
    .unwrap();

    let overdue = repo.list_overdue(tenant_id, now, 10).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, ids[1].id);

    repo.update_if_version_with_audit(
        tenant_id,
        ids[1].id,
        ids[1].version,
        RequestUpdate {
            escalated_at: Some(now),
            ..RequestUpdate::at(now)
        },
        change_entry(&ids[1], AuditAction::Escalated),
    )
    .await
    .unwrap();

    assert!(repo.list_overdue(tenant_id, now, 10).await.unwrap().is_empty());

    let pending = repo.list_unnotified_escalations(tenant_id, 10).await.unwrap();
    assert_eq!(pending.len(), 1);

    repo.mark_escalation_notified(tenant_id, ids[1].id, now)
        .await
        .unwrap();
    assert!(
        repo.list_unnotified_escalations(tenant_id, 10)
            .await
            .unwrap()
            .is_empty()
    );

    // Delivery bookkeeping leaves the version alone.
    let current = repo.get_by_id(tenant_id, ids[1].id).await.unwrap();
    assert_eq!(current.version, ids[1].version + 1);
    assert!(current.escalated);
}

#[tokio::test]
async fn list_overdue_never_crosses_tenants() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    let input = maintenance(tenant_a, Duration::hours(-1));
    let entry = created_entry(&input);
    repo.create_with_audit(input, entry).await.unwrap();

    let overdue = repo.list_overdue(tenant_b, Utc::now(), 10).await.unwrap();
    assert!(overdue.is_empty());
}

#[tokio::test]
async fn list_filters_by_unit_and_status() {
    let db = setup().await;
    let repo = SurrealServiceRequestRepository::new(db);
    let tenant_id = Uuid::new_v4();

    let first = maintenance(tenant_id, Duration::hours(1));
    let entry = created_entry(&first);
    repo.create_with_audit(first, entry).await.unwrap();

    let mut second = maintenance(tenant_id, Duration::hours(1));
    second.unit_ref = Some("7A".into());
    let entry = created_entry(&second);
    repo.create_with_audit(second, entry).await.unwrap();

    let page = repo
        .list(
            tenant_id,
            ServiceRequestFilter {
                unit_ref: Some("7A".into()),
                status: Some(RequestStatus::Open),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].unit_ref.as_deref(), Some("7A"));

    let all = repo
        .list(
            tenant_id,
            ServiceRequestFilter::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}
