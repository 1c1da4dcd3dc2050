//! Repository trait for visit events.

use crate::domain::entities::{NewVisit, Visit};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for the append-only visit log.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgVisitRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Appends a visit for the mapping identified by `new_visit.code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no mapping has that code.
    /// Returns [`AppError::StoreUnavailable`] on database errors.
    async fn record(&self, new_visit: NewVisit) -> Result<Visit, AppError>;

    /// Returns the most recent visits of each listed mapping, at most
    /// `per_mapping` each, newest first within a mapping.
    async fn recent_for_mappings(
        &self,
        mapping_ids: &[i64],
        per_mapping: i64,
    ) -> Result<Vec<Visit>, AppError>;

    /// Counts all recorded visits.
    async fn count(&self) -> Result<i64, AppError>;
}
