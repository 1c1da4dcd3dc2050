//! Handler for the shortening endpoint.

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short code for a long URL.
///
/// # Endpoint
///
/// `POST /url/shorten`
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/page",
///   "owner_id": "user-42"   // optional
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "code": "aB3xY9",
///   "short_url": "http://localhost:3000/aB3xY9",
///   "long_url": "https://example.com/page",
///   "visits": 0,
///   "created_at": "2026-01-01T00:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if validation fails
/// - 500 Internal Server Error if no free code could be allocated
/// - 503 Service Unavailable if the database cannot be reached
pub async fn shorten_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenRequest>,
) -> Result<(StatusCode, Json<ShortenResponse>), AppError> {
    payload.validate()?;

    let mapping = state
        .resolver
        .create(&payload.url, payload.owner_id)
        .await?;

    let short_url = state.short_url(&mapping.code);

    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse::from_mapping(mapping, short_url)),
    ))
}
