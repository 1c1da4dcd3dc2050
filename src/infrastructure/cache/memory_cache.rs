//! In-process cache with the same semantics as the Redis backend.

use std::time::{Duration, Instant};

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

struct CachedUrl {
    long_url: String,
    expires_at: Option<Instant>,
}

impl CachedUrl {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Thread-safe in-memory cache backed by `DashMap`.
///
/// Counter updates go through the map's entry API, so increments and
/// set-if-absent are atomic per key. Contents vanish on restart exactly like
/// an unpersisted Redis instance.
#[derive(Default)]
pub struct MemoryCache {
    mappings: DashMap<String, CachedUrl>,
    counters: DashMap<String, i64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        debug!("Using MemoryCache");
        Self::default()
    }

    /// Drops a mapping entry, leaving its counter in place.
    pub fn evict_mapping(&self, code: &str) {
        self.mappings.remove(code);
    }

    /// Drops a counter entry, leaving its mapping in place.
    pub fn evict_counter(&self, code: &str) {
        self.counters.remove(code);
    }

    /// Current counter value, if any.
    pub fn counter(&self, code: &str) -> Option<i64> {
        self.counters.get(code).map(|v| *v)
    }

    /// Whether a live mapping entry exists for `code`.
    pub fn has_mapping(&self, code: &str) -> bool {
        self.mappings.get(code).is_some_and(|e| !e.is_expired())
    }

    /// Empties the cache, as a restart would.
    pub fn flush(&self) {
        self.mappings.clear();
        self.counters.clear();
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_mapping(&self, code: &str) -> CacheResult<Option<String>> {
        let hit = self
            .mappings
            .get(code)
            .filter(|e| !e.is_expired())
            .map(|e| e.long_url.clone());

        if hit.is_none() {
            self.mappings.remove_if(code, |_, e| e.is_expired());
        }

        Ok(hit)
    }

    async fn set_mapping(
        &self,
        code: &str,
        long_url: &str,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        self.mappings.insert(
            code.to_string(),
            CachedUrl {
                long_url: long_url.to_string(),
                expires_at: ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s)),
            },
        );
        Ok(())
    }

    async fn init_counter(&self, code: &str, value: i64) -> CacheResult<bool> {
        match self.counters.entry(code.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    async fn incr_counter(&self, code: &str) -> CacheResult<i64> {
        let mut counter = self.counters.entry(code.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn get_counters(&self, codes: &[String]) -> CacheResult<Vec<Option<i64>>> {
        Ok(codes.iter().map(|c| self.counter(c)).collect())
    }

    async fn subtract_counter(&self, code: &str, delta: i64) -> CacheResult<Option<i64>> {
        Ok(self.counters.get_mut(code).map(|mut counter| {
            *counter -= delta;
            *counter
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mapping_roundtrip_and_miss() {
        let cache = MemoryCache::new();

        assert_eq!(cache.get_mapping("abc123").await.unwrap(), None);

        cache
            .set_mapping("abc123", "https://example.com", None)
            .await
            .unwrap();
        assert_eq!(
            cache.get_mapping("abc123").await.unwrap().as_deref(),
            Some("https://example.com")
        );
    }

    #[tokio::test]
    async fn test_mapping_ttl_expires() {
        let cache = MemoryCache::new();
        cache
            .set_mapping("abc123", "https://example.com", Some(0))
            .await
            .unwrap();

        assert_eq!(cache.get_mapping("abc123").await.unwrap(), None);
        assert!(!cache.has_mapping("abc123"));
    }

    #[tokio::test]
    async fn test_init_counter_is_set_if_absent() {
        let cache = MemoryCache::new();

        assert!(cache.init_counter("abc123", 5).await.unwrap());
        assert!(!cache.init_counter("abc123", 0).await.unwrap());
        assert_eq!(cache.counter("abc123"), Some(5));
    }

    #[tokio::test]
    async fn test_incr_counter_starts_from_zero() {
        let cache = MemoryCache::new();

        assert_eq!(cache.incr_counter("abc123").await.unwrap(), 1);
        assert_eq!(cache.incr_counter("abc123").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let cache = Arc::new(MemoryCache::new());
        cache.init_counter("abc123", 0).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.incr_counter("abc123").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(cache.counter("abc123"), Some(50));
    }

    #[tokio::test]
    async fn test_get_counters_is_positional() {
        let cache = MemoryCache::new();
        cache.init_counter("bbbbbb", 3).await.unwrap();

        let counters = cache
            .get_counters(&["aaaaaa".to_string(), "bbbbbb".to_string()])
            .await
            .unwrap();
        assert_eq!(counters, vec![None, Some(3)]);
    }

    #[tokio::test]
    async fn test_subtract_counter_keeps_later_increments() {
        let cache = MemoryCache::new();
        cache.init_counter("abc123", 0).await.unwrap();
        for _ in 0..4 {
            cache.incr_counter("abc123").await.unwrap();
        }

        // Read 3, one more visit lands, then the 3 are subtracted.
        cache.incr_counter("abc123").await.unwrap();
        assert_eq!(cache.subtract_counter("abc123", 3).await.unwrap(), Some(2));
        assert_eq!(cache.counter("abc123"), Some(2));
    }

    #[tokio::test]
    async fn test_subtract_counter_never_recreates_key() {
        let cache = MemoryCache::new();

        assert_eq!(cache.subtract_counter("abc123", 3).await.unwrap(), None);
        assert_eq!(cache.counter("abc123"), None);
        assert_eq!(cache.incr_counter("abc123").await.unwrap(), 1);
    }
}
