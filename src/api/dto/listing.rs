//! DTOs for mapping listings with recent visits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::application::services::MappingWithVisits;
use crate::domain::entities::Visit;

/// Upper bound accepted for `?recent=`.
pub const MAX_RECENT: u32 = 1000;

/// `?recent=N` query parameter.
///
/// Uses `serde_with` to parse the number from the query string.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub recent: Option<u32>,
}

impl RecentParams {
    /// Returns the requested limit, or `None` to use the service default.
    ///
    /// # Validation
    ///
    /// - Must be between 1 and 1000 when given
    pub fn validated(&self) -> Result<Option<i64>, String> {
        match self.recent {
            None => Ok(None),
            Some(n) if (1..=MAX_RECENT).contains(&n) => Ok(Some(n as i64)),
            Some(n) => Err(format!("recent must be between 1 and {MAX_RECENT}, got {n}")),
        }
    }
}

/// A single recorded visit.
#[derive(Debug, Serialize)]
pub struct VisitItem {
    pub visited_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
}

impl From<Visit> for VisitItem {
    fn from(v: Visit) -> Self {
        Self {
            visited_at: v.visited_at,
            client_ip: v.client_ip,
            user_agent: v.user_agent,
            referrer: v.referrer,
            country_code: v.country_code,
            city: v.city,
        }
    }
}

/// A mapping with its durable visit total and latest visits.
#[derive(Debug, Serialize)]
pub struct MappingItem {
    pub code: String,
    pub short_url: String,
    pub long_url: String,
    pub owner_id: Option<String>,
    pub visits: i64,
    pub created_at: DateTime<Utc>,
    pub recent_visits: Vec<VisitItem>,
}

impl MappingItem {
    pub fn new(listed: MappingWithVisits, short_url: String) -> Self {
        let MappingWithVisits {
            mapping,
            recent_visits,
        } = listed;

        Self {
            code: mapping.code,
            short_url,
            long_url: mapping.long_url,
            owner_id: mapping.owner_id,
            visits: mapping.visits,
            created_at: mapping.created_at,
            recent_visits: recent_visits.into_iter().map(VisitItem::from).collect(),
        }
    }
}

/// Listing of one owner's mappings.
#[derive(Debug, Serialize)]
pub struct OwnerListingResponse {
    pub owner_id: String,
    pub urls: Vec<MappingItem>,
}

/// Listing of mappings created without an owner.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub urls: Vec<MappingItem>,
}
