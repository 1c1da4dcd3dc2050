//! PostgreSQL implementation of the visit repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewVisit, Visit};
use crate::domain::repositories::VisitRepository;
use crate::error::AppError;

#[derive(sqlx::FromRow)]
struct VisitRow {
    id: i64,
    mapping_id: i64,
    visited_at: DateTime<Utc>,
    client_ip: String,
    user_agent: String,
    referrer: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
}

impl From<VisitRow> for Visit {
    fn from(r: VisitRow) -> Self {
        Visit {
            id: r.id,
            mapping_id: r.mapping_id,
            visited_at: r.visited_at,
            client_ip: r.client_ip,
            user_agent: r.user_agent,
            referrer: r.referrer,
            country_code: r.country_code,
            city: r.city,
        }
    }
}

/// PostgreSQL repository for the visit log.
pub struct PgVisitRepository {
    pool: Arc<PgPool>,
}

impl PgVisitRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn record(&self, new_visit: NewVisit) -> Result<Visit, AppError> {
        let row = sqlx::query_as::<_, VisitRow>(
            r#"
            INSERT INTO visit_events
                (mapping_id, visited_at, client_ip, user_agent, referrer, country_code, city)
            SELECT id, $2, $3, $4, $5, $6, $7
            FROM short_mappings
            WHERE code = $1
            RETURNING id, mapping_id, visited_at, client_ip, user_agent, referrer,
                      TRIM(country_code) AS country_code, city
            "#,
        )
        .bind(&new_visit.code)
        .bind(new_visit.visited_at)
        .bind(&new_visit.client_ip)
        .bind(&new_visit.user_agent)
        .bind(&new_visit.referrer)
        .bind(&new_visit.geo.country_code)
        .bind(&new_visit.geo.city)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Into::into).ok_or_else(|| {
            AppError::not_found("Short code not found", json!({ "code": new_visit.code }))
        })
    }

    async fn recent_for_mappings(
        &self,
        mapping_ids: &[i64],
        per_mapping: i64,
    ) -> Result<Vec<Visit>, AppError> {
        if mapping_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, VisitRow>(
            r#"
            SELECT id, mapping_id, visited_at, client_ip, user_agent, referrer,
                   TRIM(country_code) AS country_code, city
            FROM (
                SELECT v.*,
                       ROW_NUMBER() OVER (
                           PARTITION BY v.mapping_id
                           ORDER BY v.visited_at DESC, v.id DESC
                       ) AS rn
                FROM visit_events v
                WHERE v.mapping_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY mapping_id, visited_at DESC, id DESC
            "#,
        )
        .bind(mapping_ids)
        .bind(per_mapping)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visit_events")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
