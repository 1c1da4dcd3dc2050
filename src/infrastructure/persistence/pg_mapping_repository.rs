//! PostgreSQL implementation of the mapping repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewShortMapping, ShortMapping};
use crate::domain::repositories::MappingRepository;
use crate::error::AppError;

const MAPPING_COLUMNS: &str = "id, code, long_url, owner_id, visits, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: i64,
    code: String,
    long_url: String,
    owner_id: Option<String>,
    visits: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MappingRow> for ShortMapping {
    fn from(r: MappingRow) -> Self {
        ShortMapping::new(
            r.id,
            r.code,
            r.long_url,
            r.owner_id,
            r.visits,
            r.created_at,
            r.updated_at,
        )
    }
}

/// PostgreSQL repository for short mappings.
///
/// Every write is a single statement, so each commits on its own row.
pub struct PgMappingRepository {
    pool: Arc<PgPool>,
}

impl PgMappingRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingRepository for PgMappingRepository {
    async fn create(&self, new_mapping: NewShortMapping) -> Result<ShortMapping, AppError> {
        let row = sqlx::query_as::<_, MappingRow>(&format!(
            "INSERT INTO short_mappings (code, long_url, owner_id)
             VALUES ($1, $2, $3)
             RETURNING {MAPPING_COLUMNS}"
        ))
        .bind(&new_mapping.code)
        .bind(&new_mapping.long_url)
        .bind(&new_mapping.owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortMapping>, AppError> {
        let row = sqlx::query_as::<_, MappingRow>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM short_mappings WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM short_mappings WHERE code = $1)")
                .bind(code)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(exists)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortMapping>, AppError> {
        let rows = sqlx::query_as::<_, MappingRow>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM short_mappings
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_unowned(&self) -> Result<Vec<ShortMapping>, AppError> {
        let rows = sqlx::query_as::<_, MappingRow>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM short_mappings
             WHERE owner_id IS NULL
             ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn page_after(&self, after_id: i64, limit: i64) -> Result<Vec<ShortMapping>, AppError> {
        let rows = sqlx::query_as::<_, MappingRow>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM short_mappings
             WHERE id > $1
             ORDER BY id
             LIMIT $2"
        ))
        .bind(after_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn increment_visits(&self, code: &str, by: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE short_mappings SET visits = visits + $2, updated_at = NOW() WHERE code = $1",
        )
        .bind(code)
        .bind(by)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_mappings")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn total_visits(&self) -> Result<i64, AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(visits), 0)::BIGINT FROM short_mappings")
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(total)
    }
}
