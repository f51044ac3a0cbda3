//! SurrealDB implementation of [`TenantRepository`].
//!
//! The registry is the only global table. The escalation monitor pages
//! through it to decide which tenants get a sweep worker.

use chrono::{DateTime, Utc};
use estate_core::error::{EstateError, EstateResult};
use estate_core::models::tenant::{CreateTenant, Tenant};
use estate_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct TenantRecord {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRecord> for Tenant {
    type Error = DbError;

    fn try_from(record: TenantRecord) -> Result<Self, Self::Error> {
        Ok(Tenant {
            id: parse_uuid("tenant", &record.record_id)?,
            name: record.name,
            slug: record.slug,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Slugs are lowercase ASCII words joined by single hyphens.
fn validate_slug(slug: &str) -> EstateResult<()> {
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(EstateError::validation(
            "slug",
            format!("`{slug}` is not a lowercase hyphenated slug"),
        ))
    }
}

/// SurrealDB implementation of the tenant registry.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: Uuid) -> EstateResult<Option<Tenant>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let records: Vec<TenantRecord> = result.take(0).map_err(DbError::from)?;
        match records.into_iter().next() {
            Some(record) => Ok(Some(Tenant::try_from(record)?)),
            None => Ok(None),
        }
    }

    async fn slug_taken(&self, slug: &str) -> EstateResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM tenant WHERE slug = $slug GROUP ALL")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(counts.first().is_some_and(|c| c.total > 0))
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> EstateResult<Tenant> {
        validate_slug(&input.slug)?;
        if input.name.trim().is_empty() {
            return Err(EstateError::validation("name", "tenant name is required"));
        }

        let id = Uuid::new_v4();
        let response = self
            .db
            .query("CREATE type::record('tenant', $id) SET name = $name, slug = $slug")
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug.clone()))
            .await
            .map_err(DbError::from)?;

        // The only constraint a valid input can violate is the unique slug.
        if let Err(e) = response.check() {
            if self.slug_taken(&input.slug).await? {
                return Err(EstateError::AlreadyExists {
                    entity: "tenant".into(),
                    id: input.slug,
                });
            }
            return Err(DbError::Query(e.to_string()).into());
        }

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> EstateResult<Tenant> {
        self.find(id).await?.ok_or_else(|| EstateError::NotFound {
            entity: "tenant".into(),
            id: id.to_string(),
        })
    }

    async fn list(&self, pagination: Pagination) -> EstateResult<PaginatedResult<Tenant>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset;",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let records: Vec<TenantRecord> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: records
                .into_iter()
                .map(Tenant::try_from)
                .collect::<Result<Vec<_>, DbError>>()?,
            total: counts.first().map(|c| c.total).unwrap_or(0),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
