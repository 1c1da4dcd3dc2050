//! Handler for short code redirects.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::domain::visit_event::ClientContext;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::client_ip;

/// Redirects a short code to its long URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Validate the code format (no I/O on malformed codes)
/// 2. Resolve through the cache, falling back to the database on a miss
/// 3. Count the visit and queue it for background persistence
/// 4. Return 302 Found
///
/// # Client Context
///
/// The client IP comes from the socket peer address, or from
/// `X-Forwarded-For` / `X-Real-IP` when the service runs behind a proxy.
/// `User-Agent` and `Referer` are forwarded as-is.
///
/// # Errors
///
/// - 400 Bad Request if the code is malformed
/// - 404 Not Found if the code does not exist
/// - 503 Service Unavailable if the database cannot be reached on a miss
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Response, AppError> {
    let context = ClientContext::new(client_ip(&headers, addr, state.behind_proxy))
        .with_user_agent(header_str(&headers, header::USER_AGENT))
        .with_referrer(header_str(&headers, header::REFERER));

    let long_url = state.resolver.resolve(&code, context).await?;

    let location = location_header(&long_url).ok_or_else(|| {
        AppError::StoreUnavailable(format!("stored URL for {} is not a valid header", code))
    })?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Uses the stored URL verbatim when it is ASCII, otherwise its
/// percent-encoded serialization.
fn location_header(long_url: &str) -> Option<HeaderValue> {
    if long_url.is_ascii() {
        return HeaderValue::try_from(long_url).ok();
    }

    let encoded = url::Url::parse(long_url).ok()?;
    HeaderValue::try_from(encoded.as_str()).ok()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
