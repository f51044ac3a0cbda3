//! Database-specific error types and conversions.

use estate_core::error::EstateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored record is malformed: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for EstateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EstateError::NotFound { entity, id },
            other => EstateError::Database(other.to_string()),
        }
    }
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}
