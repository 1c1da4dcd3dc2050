//! Visit entity: one persisted redirect.

use chrono::{DateTime, Utc};

/// Coarse location attached to a visit when the geo lookup succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeoInfo {
    pub country_code: Option<String>,
    pub city: Option<String>,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && self.city.is_none()
    }
}

/// A recorded visit. Append-only: never updated or deleted by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub id: i64,
    pub mapping_id: i64,
    pub visited_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
}

/// Input data for recording a visit against a short code.
///
/// The store resolves `code` to the owning mapping inside the insert.
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub code: String,
    pub visited_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub geo: GeoInfo,
}
