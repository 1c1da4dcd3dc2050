//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService, counter_key, mapping_key};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, Script, aio::ConnectionManager};
use tracing::{debug, info};

/// `DECRBY` that leaves an absent counter absent.
const SUBTRACT_IF_PRESENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('DECRBY', KEYS[1], ARGV[1])
end
return false
"#;

/// Redis cache for mapping lookups and visit counters.
///
/// Uses `ConnectionManager` for connection reuse and automatic reconnects.
/// Errors are returned as [`CacheError::Unavailable`]; callers decide how to
/// degrade.
pub struct RedisCache {
    client: ConnectionManager,
    subtract_script: Script,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the URL is invalid, the connection
    /// cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis PING failed: {}", e)))?;

        info!("Connected to Redis");

        Ok(Self {
            client: manager,
            subtract_script: Script::new(SUBTRACT_IF_PRESENT),
        })
    }
}

fn unavailable(op: &str, code: &str, e: RedisError) -> CacheError {
    CacheError::Unavailable(format!("Redis {} failed for {}: {}", op, code, e))
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_mapping(&self, code: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();

        let url = conn
            .get::<_, Option<String>>(mapping_key(code))
            .await
            .map_err(|e| unavailable("GET", code, e))?;

        match &url {
            Some(url) => debug!("Cache HIT: {} -> {}", code, url),
            None => debug!("Cache MISS: {}", code),
        }

        Ok(url)
    }

    async fn set_mapping(
        &self,
        code: &str,
        long_url: &str,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        let mut conn = self.client.clone();
        let key = mapping_key(code);

        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, long_url, ttl).await,
            None => conn.set::<_, _, ()>(&key, long_url).await,
        }
        .map_err(|e| unavailable("SET", code, e))?;

        debug!("Cache SET: {} -> {} (TTL: {:?})", code, long_url, ttl_seconds);
        Ok(())
    }

    async fn init_counter(&self, code: &str, value: i64) -> CacheResult<bool> {
        let mut conn = self.client.clone();

        conn.set_nx::<_, _, bool>(counter_key(code), value)
            .await
            .map_err(|e| unavailable("SETNX", code, e))
    }

    async fn incr_counter(&self, code: &str) -> CacheResult<i64> {
        let mut conn = self.client.clone();

        conn.incr::<_, _, i64>(counter_key(code), 1)
            .await
            .map_err(|e| unavailable("INCR", code, e))
    }

    async fn get_counters(&self, codes: &[String]) -> CacheResult<Vec<Option<i64>>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = codes.iter().map(|c| counter_key(c)).collect();
        let mut conn = self.client.clone();

        conn.mget::<_, Vec<Option<i64>>>(&keys)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis MGET failed: {}", e)))
    }

    async fn subtract_counter(&self, code: &str, delta: i64) -> CacheResult<Option<i64>> {
        let mut conn = self.client.clone();

        let remaining: Option<i64> = self
            .subtract_script
            .key(counter_key(code))
            .arg(delta)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| unavailable("EVAL", code, e))?;

        Ok(remaining)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
