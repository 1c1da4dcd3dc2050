//! Per-client rate limiting for write endpoints.

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor,
};

/// Sustained requests per second allowed per peer IP on `POST /url/shorten`.
pub const SHORTEN_PER_SECOND: u64 = 2;
/// Requests a single peer may burst before being throttled.
pub const SHORTEN_BURST: u32 = 20;

/// Token-bucket limiter for mapping creation.
///
/// Keyed by socket peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Requests over the
/// limit receive `429 Too Many Requests`.
///
/// Redirects are deliberately not limited: they are served from the cache
/// and counted.
pub fn shorten_layer()
-> GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body> {
    layer(SHORTEN_PER_SECOND, SHORTEN_BURST)
}

fn layer(
    per_second: u64,
    burst: u32,
) -> GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(per_second)
            .burst_size(burst)
            .finish()
            .expect("rate limit quota must be non-zero"),
    );

    GovernorLayer::new(governor_conf)
}
