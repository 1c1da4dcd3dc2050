//! Visit event model for asynchronous visit recording.

use chrono::{DateTime, Utc};

use crate::domain::entities::GeoInfo;

/// Request metadata the HTTP layer hands to the resolver.
///
/// `geo` is filled only when the edge already knows the location; otherwise
/// the visit worker asks the configured [`crate::domain::geo::GeoLocator`].
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub geo: Option<GeoInfo>,
}

impl ClientContext {
    /// Creates a context for a client IP with no further metadata.
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<&str>) -> Self {
        self.user_agent = user_agent.map(str::to_string);
        self
    }

    pub fn with_referrer(mut self, referrer: Option<&str>) -> Self {
        self.referrer = referrer.map(str::to_string);
        self
    }

    pub fn with_geo(mut self, geo: GeoInfo) -> Self {
        self.geo = Some(geo);
        self
    }
}

/// A resolved redirect waiting to be persisted by the visit worker.
///
/// The timestamp is taken when the redirect is served, so queueing delay
/// never shifts the recorded visit time.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub code: String,
    pub occurred_at: DateTime<Utc>,
    pub context: ClientContext,
}

impl VisitEvent {
    pub fn new(code: impl Into<String>, context: ClientContext) -> Self {
        Self {
            code: code.into(),
            occurred_at: Utc::now(),
            context,
        }
    }
}
