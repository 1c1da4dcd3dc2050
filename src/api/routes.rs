//! API route configuration.

use crate::api::handlers::{owner_listing_handler, shorten_handler, stats_handler};
use crate::api::middleware::rate_limit;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Mapping management routes.
///
/// # Endpoints
///
/// - `POST /url/shorten`     - Create a short code (rate limited)
/// - `GET  /url/stats`       - Unowned mappings with recent visits
/// - `GET  /usr/{owner_id}`  - An owner's mappings with recent visits
pub fn url_routes() -> Router<AppState> {
    let shorten = Router::new()
        .route("/url/shorten", post(shorten_handler))
        .layer(rate_limit::shorten_layer());

    Router::new()
        .merge(shorten)
        .route("/url/stats", get(stats_handler))
        .route("/usr/{owner_id}", get(owner_listing_handler))
}
