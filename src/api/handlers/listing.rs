//! Handlers for mapping listings.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;

use crate::api::dto::listing::{MappingItem, OwnerListingResponse, RecentParams, StatsResponse};
use crate::application::services::MappingWithVisits;
use crate::error::AppError;
use crate::state::AppState;

/// Lists an owner's mappings with their most recent visits.
///
/// # Endpoint
///
/// `GET /usr/{owner_id}?recent=N`
///
/// Mappings are ordered by latest visit, never-visited ones last.
///
/// # Errors
///
/// - 400 Bad Request if `recent` is out of range
/// - 404 Not Found if the owner has no mappings
pub async fn owner_listing_handler(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<OwnerListingResponse>, AppError> {
    let recent = params
        .validated()
        .map_err(|e| AppError::bad_request(e, json!({})))?;

    let listed = state.resolver.list_by_owner(&owner_id, recent).await?;

    if listed.is_empty() {
        return Err(AppError::not_found(
            "No short URLs for this owner",
            json!({ "owner_id": owner_id }),
        ));
    }

    Ok(Json(OwnerListingResponse {
        owner_id,
        urls: to_items(&state, listed),
    }))
}

/// Lists mappings created without an owner.
///
/// # Endpoint
///
/// `GET /url/stats?recent=N`
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let recent = params
        .validated()
        .map_err(|e| AppError::bad_request(e, json!({})))?;

    let listed = state.resolver.list_unowned(recent).await?;

    Ok(Json(StatsResponse {
        urls: to_items(&state, listed),
    }))
}

fn to_items(state: &AppState, listed: Vec<MappingWithVisits>) -> Vec<MappingItem> {
    listed
        .into_iter()
        .map(|m| {
            let short_url = state.short_url(&m.mapping.code);
            MappingItem::new(m, short_url)
        })
        .collect()
}
