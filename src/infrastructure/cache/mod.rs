//! Fast cache layer for mapping lookups and visit counters.
//!
//! Provides a [`CacheService`] trait with three implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`MemoryCache`] - In-process cache for single-node setups and tests
//! - [`NullCache`] - Disabled cache; every call reports [`CacheError::Disabled`]
//!
//! Key layout: `mapping:<code>` holds the long URL, `counter:<code>` the
//! running visit total not yet folded into the durable store.

mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use memory_cache::MemoryCache;
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{
    COUNTER_PREFIX, CacheError, CacheResult, CacheService, MAPPING_PREFIX, counter_key,
    mapping_key,
};

#[cfg(test)]
pub use service::MockCacheService;
