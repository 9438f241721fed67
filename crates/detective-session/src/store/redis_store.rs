//! Redis-backed store using a bounded connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use tracing::{debug, trace};

use super::{FieldMap, KeyTtl, KeyValueStore};
use crate::error::{Error, Result};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: usize = 200;

/// Redis implementation of [`KeyValueStore`].
///
/// Each operation checks a connection out of the pool for its duration, so
/// concurrent request handlers never share a single connection handle.
/// Sessions are Redis hashes; the expiry index is a sorted set.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisStore")
            .field("max_size", &status.max_size)
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

impl RedisStore {
    /// Build a pool for `url` holding at most `pool_size` connections.
    ///
    /// Connections are opened lazily; use [`ping`](Self::ping) to verify
    /// reachability up front.
    pub fn connect(url: &str, pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::InvalidConfig(
                "store pool size must be at least 1".to_string(),
            ));
        }

        let mut config = Config::from_url(url);
        config.pool = Some(PoolConfig::new(pool_size));
        let pool = config.create_pool(Some(Runtime::Tokio1))?;

        debug!(pool_size, "Created Redis connection pool");
        Ok(Self { pool })
    }

    /// Round-trip a PING to check the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn conn(&self) -> Result<Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn put(&self, key: &str, fields: &FieldMap) -> Result<()> {
        // HSET with no field pairs is a protocol error.
        if fields.is_empty() {
            return Ok(());
        }

        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key, &items).await?;
        trace!(key = %key, fields = items.len(), "HSET");
        Ok(())
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let secs = i64::try_from(ttl.as_secs())
            .map_err(|_| Error::InvalidConfig(format!("TTL of {}s is out of range", ttl.as_secs())))?;
        let mut conn = self.conn().await?;
        let _: () = conn.expire(key, secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<FieldMap> {
        let mut conn = self.conn().await?;
        let fields: FieldMap = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.conn().await?;

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.conn().await?;
        let raw: i64 = conn.ttl(key).await?;
        Ok(KeyTtl::from_redis(raw))
    }

    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(index, member, score).await?;
        Ok(())
    }

    async fn index_due(&self, index: &str, max_score: i64) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.zrangebyscore(index, "-inf", max_score).await?;
        Ok(members)
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zrem(index, member).await?;
        Ok(())
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("session:"), "session:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let result = RedisStore::connect("redis://127.0.0.1:6379", 0);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_connect_is_lazy() {
        // Nothing listens here; building the pool must still succeed.
        let store = RedisStore::connect("redis://127.0.0.1:1", 2).unwrap();
        assert!(format!("{store:?}").contains("max_size: 2"));
    }
}
