//! Best-effort geo lookup capability.
//!
//! The lookup itself belongs to an external service. Absence of a result
//! never changes how a visit is processed; it only leaves the geo columns empty.

use async_trait::async_trait;

use crate::domain::entities::GeoInfo;

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolves an IP to a coarse location. Failures are reported as `None`.
    async fn locate(&self, ip: &str) -> Option<GeoInfo>;
}

/// Locator used when no geo service is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeoLocator;

#[async_trait]
impl GeoLocator for NoGeoLocator {
    async fn locate(&self, _ip: &str) -> Option<GeoInfo> {
        None
    }
}
