//! Shared state injected into every handler.

use std::sync::Arc;

use crate::application::services::RedirectResolver;
use crate::infrastructure::cache::CacheService;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<RedirectResolver>,
    pub cache: Arc<dyn CacheService>,
    /// Prefix for rendered short URLs, without a trailing slash.
    pub base_url: String,
    /// Trust `X-Forwarded-For` / `X-Real-IP` when recording the client IP.
    pub behind_proxy: bool,
}

impl AppState {
    pub fn new(
        resolver: Arc<RedirectResolver>,
        cache: Arc<dyn CacheService>,
        base_url: impl Into<String>,
        behind_proxy: bool,
    ) -> Self {
        Self {
            resolver,
            cache,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            behind_proxy,
        }
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}
