//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Owning-tenant and creation fields
//! are READONLY so they cannot change after the record is created.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global registry)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string READONLY;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['SuperUser', 'Admin', 'Tenant', 'DepartmentUser'];
DEFINE FIELD department ON TABLE user TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Maintenance', 'Taxi', 'Leasing'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['Active', 'Inactive'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;

-- =======================================================================
-- Service requests (tenant scope)
-- =======================================================================
DEFINE TABLE service_request SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE service_request TYPE string READONLY;
DEFINE FIELD kind ON TABLE service_request TYPE string READONLY \
    ASSERT $value IN ['Maintenance', 'Taxi', 'Contact'];
DEFINE FIELD status ON TABLE service_request TYPE string \
    ASSERT $value IN ['Open', 'New', 'Pending', 'Assigned', \
    'InProgress', 'Resolved', 'Completed', 'Cancelled'];
DEFINE FIELD priority ON TABLE service_request TYPE string \
    ASSERT $value IN ['Low', 'Medium', 'High'];
DEFINE FIELD created_by ON TABLE service_request TYPE string READONLY;
DEFINE FIELD assigned_to ON TABLE service_request TYPE option<string>;
DEFINE FIELD unit_ref ON TABLE service_request TYPE option<string>;
DEFINE FIELD details ON TABLE service_request TYPE object FLEXIBLE \
    READONLY;
DEFINE FIELD idempotency_key ON TABLE service_request \
    TYPE option<string> READONLY;
DEFINE FIELD escalation_deadline ON TABLE service_request TYPE datetime;
DEFINE FIELD escalated ON TABLE service_request TYPE bool DEFAULT false;
DEFINE FIELD escalated_at ON TABLE service_request TYPE option<datetime>;
DEFINE FIELD escalation_notified_at ON TABLE service_request \
    TYPE option<datetime>;
DEFINE FIELD version ON TABLE service_request TYPE int;
DEFINE FIELD created_at ON TABLE service_request TYPE datetime READONLY;
DEFINE FIELD updated_at ON TABLE service_request TYPE datetime;
DEFINE INDEX idx_request_tenant_status ON TABLE service_request \
    COLUMNS tenant_id, status;
DEFINE INDEX idx_request_tenant_assigned ON TABLE service_request \
    COLUMNS tenant_id, assigned_to;
DEFINE INDEX idx_request_tenant_priority ON TABLE service_request \
    COLUMNS tenant_id, priority;
DEFINE INDEX idx_request_tenant_unit ON TABLE service_request \
    COLUMNS tenant_id, unit_ref;
DEFINE INDEX idx_request_tenant_deadline ON TABLE service_request \
    COLUMNS tenant_id, escalated, escalation_deadline;

-- =======================================================================
-- Audit log (tenant scope, append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL \
    PERMISSIONS FOR update, delete NONE;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string READONLY \
    ASSERT $value IN ['User', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string READONLY \
    ASSERT $value IN ['Created', 'Assigned', 'StatusChanged', \
    'Escalated', 'Rescheduled'];
DEFINE FIELD resource_type ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD resource_id ON TABLE audit_log TYPE string READONLY;
DEFINE FIELD details ON TABLE audit_log TYPE object FLEXIBLE READONLY \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime READONLY;
DEFINE INDEX idx_audit_tenant_resource ON TABLE audit_log \
    COLUMNS tenant_id, resource_id;
DEFINE INDEX idx_audit_tenant_timestamp ON TABLE audit_log \
    COLUMNS tenant_id, timestamp;

-- =======================================================================
-- SLA policy (tenant scope system settings)
-- =======================================================================
DEFINE TABLE sla_policy SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE sla_policy TYPE string READONLY;
DEFINE FIELD kind ON TABLE sla_policy TYPE string READONLY \
    ASSERT $value IN ['Maintenance', 'Taxi', 'Contact'];
DEFINE FIELD priority ON TABLE sla_policy TYPE string READONLY \
    ASSERT $value IN ['Low', 'Medium', 'High'];
DEFINE FIELD window_secs ON TABLE sla_policy TYPE int \
    ASSERT $value >= 0;
DEFINE FIELD updated_at ON TABLE sla_policy TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_sla_policy_tenant_kind_priority ON TABLE sla_policy \
    COLUMNS tenant_id, kind, priority UNIQUE;

-- =======================================================================
-- Notification outbox (tenant scope)
-- =======================================================================
DEFINE TABLE notification SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE notification TYPE string READONLY;
DEFINE FIELD event_kind ON TABLE notification TYPE string \
    ASSERT $value IN ['Escalated', 'Assigned'];
DEFINE FIELD idempotency_key ON TABLE notification TYPE string READONLY;
DEFINE FIELD payload ON TABLE notification TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE notification TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE INDEX idx_notification_tenant_key ON TABLE notification \
    COLUMNS tenant_id, idempotency_key UNIQUE;
";

/// Run all pending migrations.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}
