//! Integration tests for tenant and user repositories using in-memory
//! SurrealDB.

use estate_core::error::EstateError;
use estate_core::models::tenant::CreateTenant;
use estate_core::models::user::{CreateUser, Department, Role, UpdateUser, UserStatus};
use estate_core::repository::{Pagination, TenantRepository, UserRepository};
use estate_db::repository::{SurrealTenantRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    estate_db::run_migrations(&db).await.unwrap();
    db
}

async fn tenant(db: &Surreal<Db>, slug: &str) -> uuid::Uuid {
    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: slug.to_uppercase(),
            slug: slug.into(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn create_and_get_tenant() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let created = repo
        .create(CreateTenant {
            name: "Harbour Towers".into(),
            slug: "harbour-towers".into(),
        })
        .await
        .unwrap();

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.name, "Harbour Towers");
    assert_eq!(fetched.slug, "harbour-towers");
}

#[tokio::test]
async fn duplicate_slug_already_exists() {
    let db = setup().await;
    tenant(&db, "harbour-towers").await;

    let err = SurrealTenantRepository::new(db)
        .create(CreateTenant {
            name: "Another Harbour".into(),
            slug: "harbour-towers".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::AlreadyExists { .. }));
}

#[tokio::test]
async fn malformed_slug_is_rejected() {
    let db = setup().await;
    let err = SurrealTenantRepository::new(db)
        .create(CreateTenant {
            name: "Harbour Towers".into(),
            slug: "Harbour Towers".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::Validation { ref field, .. } if field == "slug"));
}

#[tokio::test]
async fn list_tenants_paginates() {
    let db = setup().await;
    for slug in ["a", "b", "c"] {
        tenant(&db, slug).await;
    }

    let repo = SurrealTenantRepository::new(db);
    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn missing_tenant_is_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.get_by_id(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EstateError::NotFound { .. }));
}

#[tokio::test]
async fn create_department_user() {
    let db = setup().await;
    let tenant_id = tenant(&db, "acme").await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            tenant_id,
            name: "Sam".into(),
            email: "sam@example.com".into(),
            role: Role::DepartmentUser,
            department: Some(Department::Taxi),
        })
        .await
        .unwrap();

    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.department, Some(Department::Taxi));

    let fetched = repo.get_by_id(tenant_id, user.id).await.unwrap();
    assert_eq!(fetched.email, "sam@example.com");
}

#[tokio::test]
async fn department_user_requires_department() {
    let db = setup().await;
    let tenant_id = tenant(&db, "acme").await;
    let repo = SurrealUserRepository::new(db);

    let err = repo
        .create(CreateUser {
            tenant_id,
            name: "Sam".into(),
            email: "sam@example.com".into(),
            role: Role::DepartmentUser,
            department: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::Validation { .. }));
}

#[tokio::test]
async fn user_from_another_tenant_is_denied() {
    let db = setup().await;
    let tenant_a = tenant(&db, "a").await;
    let tenant_b = tenant(&db, "b").await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            tenant_id: tenant_a,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role: Role::Admin,
            department: None,
        })
        .await
        .unwrap();

    let err = repo.get_by_id(tenant_b, user.id).await.unwrap_err();
    assert!(matches!(err, EstateError::AuthorizationDenied { .. }));

    let err = repo
        .update(
            tenant_b,
            user.id,
            UpdateUser {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EstateError::AuthorizationDenied { .. }));

    // Untouched.
    let fetched = repo.get_by_id(tenant_a, user.id).await.unwrap();
    assert_eq!(fetched.status, UserStatus::Active);
}

#[tokio::test]
async fn deactivate_user() {
    let db = setup().await;
    let tenant_id = tenant(&db, "acme").await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            tenant_id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role: Role::Admin,
            department: None,
        })
        .await
        .unwrap();

    let updated = repo
        .update(
            tenant_id,
            user.id,
            UpdateUser {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, UserStatus::Inactive);
    assert_eq!(updated.name, "Ada");

    let page = repo.list(tenant_id, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);
}
