//! Short mapping entity: the durable record behind a short code.

use chrono::{DateTime, Utc};

/// A short code bound to a long URL, with its durable visit total.
///
/// `long_url` never changes after creation. `visits` is raised by the
/// reconciliation job and by the resolver's cache-outage fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortMapping {
    pub id: i64,
    pub code: String,
    pub long_url: String,
    pub owner_id: Option<String>,
    pub visits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortMapping {
    /// Creates a new ShortMapping instance.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        code: String,
        long_url: String,
        owner_id: Option<String>,
        visits: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            code,
            long_url,
            owner_id,
            visits,
            created_at,
            updated_at,
        }
    }

    /// Returns true if an owner identifier was attached at creation.
    pub fn is_owned(&self) -> bool {
        self.owner_id.is_some()
    }
}

/// Input data for creating a new mapping. Visits always start at zero.
#[derive(Debug, Clone)]
pub struct NewShortMapping {
    pub code: String,
    pub long_url: String,
    pub owner_id: Option<String>,
}
