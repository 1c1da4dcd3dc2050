//! DTOs for the shortening endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::ShortMapping;

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The original URL to shorten (must be valid HTTP/HTTPS).
    #[validate(url(message = "Invalid URL format"))]
    #[validate(length(max = 2048))]
    pub url: String,

    /// Opaque owner identifier supplied by the caller's auth layer.
    #[validate(length(min = 1, max = 255))]
    pub owner_id: Option<String>,
}

/// Created mapping as returned to the client.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub code: String,
    pub short_url: String,
    pub long_url: String,
    pub visits: i64,
    pub created_at: DateTime<Utc>,
}

impl ShortenResponse {
    pub fn from_mapping(mapping: ShortMapping, short_url: String) -> Self {
        Self {
            code: mapping.code,
            short_url,
            long_url: mapping.long_url,
            visits: mapping.visits,
            created_at: mapping.created_at,
        }
    }
}
