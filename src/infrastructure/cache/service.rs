//! Cache service trait and error types.

use async_trait::async_trait;

/// Key namespace for `code -> long URL` entries.
pub const MAPPING_PREFIX: &str = "mapping:";
/// Key namespace for `code -> visit counter` entries.
pub const COUNTER_PREFIX: &str = "counter:";

pub fn mapping_key(code: &str) -> String {
    format!("{MAPPING_PREFIX}{code}")
}

pub fn counter_key(code: &str) -> String {
    format!("{COUNTER_PREFIX}{code}")
}

/// Errors that can occur during cache operations.
///
/// Callers treat every variant as "cache not usable right now" and fall back
/// to the durable store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache disabled")]
    Disabled,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Volatile key-value store holding mapping and counter entries.
///
/// Every operation is a single atomic primitive of the backend. No
/// in-process locking is layered on top.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process cache
/// - [`crate::infrastructure::cache::NullCache`] - Reports every call as disabled
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Reads `mapping:<code>`. `Ok(None)` is a miss.
    async fn get_mapping(&self, code: &str) -> CacheResult<Option<String>>;

    /// Writes `mapping:<code>`, expiring after `ttl_seconds` when given.
    async fn set_mapping(&self, code: &str, long_url: &str, ttl_seconds: Option<u64>)
    -> CacheResult<()>;

    /// Sets `counter:<code>` to `value` only if the key is absent.
    ///
    /// Returns `true` when the value was written.
    async fn init_counter(&self, code: &str, value: i64) -> CacheResult<bool>;

    /// Atomically increments `counter:<code>` and returns the new value.
    ///
    /// An absent counter is treated as zero.
    async fn incr_counter(&self, code: &str) -> CacheResult<i64>;

    /// Reads the counters of `codes`, positionally aligned with the input.
    async fn get_counters(&self, codes: &[String]) -> CacheResult<Vec<Option<i64>>>;

    /// Atomically subtracts `delta` from `counter:<code>` and returns what is
    /// left.
    ///
    /// An absent counter is not recreated: the call returns `Ok(None)` and
    /// writes nothing. Increments that land between the read and this call
    /// stay in the counter.
    async fn subtract_counter(&self, code: &str, delta: i64) -> CacheResult<Option<i64>>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
