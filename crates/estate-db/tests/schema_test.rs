//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    estate_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "user",
        "service_request",
        "audit_log",
        "sla_policy",
        "notification",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    estate_db::run_migrations(&db).await.unwrap();
    estate_db::run_migrations(&db).await.unwrap();
}

#[tokio::test]
async fn schema_rejects_unknown_status() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    estate_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE service_request SET tenant_id = 't', kind = 'Taxi', \
             status = 'Teleported', priority = 'Low', created_by = 'u', \
             details = {}, escalation_deadline = time::now(), \
             version = 1, created_at = time::now(), updated_at = time::now()",
        )
        .await
        .unwrap();
    assert!(result.check().is_err(), "unknown status must be rejected");
}
