//! Repository trait for short mapping data access.

use crate::domain::entities::{NewShortMapping, ShortMapping};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for the authoritative short mapping records.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgMappingRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Persists a new mapping with `visits = 0`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the code is already taken.
    /// Returns [`AppError::StoreUnavailable`] on database errors.
    async fn create(&self, new_mapping: NewShortMapping) -> Result<ShortMapping, AppError>;

    /// Finds a mapping by its short code.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortMapping>, AppError>;

    /// Returns true if the code is already in use.
    async fn exists(&self, code: &str) -> Result<bool, AppError>;

    /// Lists mappings created for the given owner, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortMapping>, AppError>;

    /// Lists mappings created without an owner, newest first.
    async fn list_unowned(&self) -> Result<Vec<ShortMapping>, AppError>;

    /// Returns up to `limit` mappings with `id > after_id`, ordered by id.
    ///
    /// Keyset pagination used by the reconciliation job to walk every mapping.
    async fn page_after(&self, after_id: i64, limit: i64) -> Result<Vec<ShortMapping>, AppError>;

    /// Adds `by` to the durable visit total in a single commit.
    ///
    /// Used by reconciliation to fold pending counter values in, and by the
    /// resolver when the cache cannot hold an increment. `by` is positive.
    async fn increment_visits(&self, code: &str, by: i64) -> Result<(), AppError>;

    /// Counts all mappings. Doubles as the store health check.
    async fn count(&self) -> Result<i64, AppError>;

    /// Sums durable visit totals over all mappings.
    async fn total_visits(&self) -> Result<i64, AppError>;
}
