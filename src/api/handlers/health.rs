//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: Counts mappings
/// 2. **Visit Queue**: Checks if channel is open and reports free slots
/// 3. **Cache**: Backend health check (`none` always reports ok)
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (database, cache) = tokio::join!(check_database(&state), check_cache(&state));
    let visit_queue = check_visit_queue(&state);

    let all_healthy = database.is_ok() && visit_queue.is_ok() && cache.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            database,
            visit_queue,
            cache,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    match state.resolver.store_healthy().await {
        Ok(count) => CheckStatus::ok(format!("Connected, {} mappings", count)),
        Err(e) => {
            tracing::warn!("Health check: database error: {}", e);
            CheckStatus::error("Database unavailable")
        }
    }
}

fn check_visit_queue(state: &AppState) -> CheckStatus {
    match state.resolver.visit_queue_status() {
        (true, free) => CheckStatus::ok(format!("Free slots: {}", free)),
        (false, _) => CheckStatus::error("Visit queue is closed"),
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    let backend = state.cache.backend();

    if state.cache.health_check().await {
        CheckStatus::ok(format!("{} ok", backend))
    } else {
        CheckStatus::error(format!("{} unreachable", backend))
    }
}
