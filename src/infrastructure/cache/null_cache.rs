//! Cache implementation used when caching is disabled.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use tracing::debug;

/// A cache that stores nothing and reports every call as [`CacheError::Disabled`].
///
/// The resolver then reads from and counts in the durable store directly.
///
/// # Use Cases
///
/// - `CACHE_BACKEND=none`
/// - Fallback when Redis is configured but unreachable at startup
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache instance.
    pub fn new() -> Self {
        debug!("Using NullCache (caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    async fn get_mapping(&self, _code: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Disabled)
    }

    async fn set_mapping(
        &self,
        _code: &str,
        _long_url: &str,
        _ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        Err(CacheError::Disabled)
    }

    async fn init_counter(&self, _code: &str, _value: i64) -> CacheResult<bool> {
        Err(CacheError::Disabled)
    }

    async fn incr_counter(&self, _code: &str) -> CacheResult<i64> {
        Err(CacheError::Disabled)
    }

    async fn get_counters(&self, _codes: &[String]) -> CacheResult<Vec<Option<i64>>> {
        Err(CacheError::Disabled)
    }

    async fn subtract_counter(&self, _code: &str, _delta: i64) -> CacheResult<Option<i64>> {
        Err(CacheError::Disabled)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}
