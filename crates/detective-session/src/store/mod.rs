//! Key-value store adapter.
//!
//! Sessions live in a remote cache as flat string field-sets under a
//! namespaced key. [`KeyValueStore`] is the seam between the lifecycle
//! controller and that service: every operation returns either a value or
//! an explicit [`Error::StoreUnavailable`](crate::Error::StoreUnavailable),
//! never a panic.
//!
//! Two implementations ship with the crate:
//! - [`RedisStore`] talks to Redis through a bounded connection pool
//! - [`MemoryStore`] keeps everything in-process (tests, dry runs)

mod memory;
mod redis_store;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;
pub use redis_store::{DEFAULT_POOL_SIZE, RedisStore};

/// Flat string fields stored under one key.
pub type FieldMap = HashMap<String, String>;

/// Remaining lifetime of a key as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and expires after this many seconds.
    Remaining(u64),
    /// Key exists without an expiry.
    NoExpiry,
    /// Key does not exist.
    Absent,
}

impl KeyTtl {
    /// Interpret a raw Redis `TTL` reply (`-1` no expiry, `-2` absent).
    pub fn from_redis(raw: i64) -> Self {
        match raw {
            -1 => KeyTtl::NoExpiry,
            n if n < 0 => KeyTtl::Absent,
            n => KeyTtl::Remaining(n as u64),
        }
    }
}

/// Storage backend for session records.
///
/// Field writes are upserts: `put` replaces the named fields and leaves the
/// others alone. Nothing here is transactional across keys or fields.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `fields` under `key`, replacing fields with the same names.
    async fn put(&self, key: &str, fields: &FieldMap) -> Result<()>;

    /// Set the remaining lifetime of the whole key.
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Read every field of `key`; a missing key yields an empty map.
    async fn get(&self, key: &str) -> Result<FieldMap>;

    /// Remove `key` and all its fields. No-op if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate keys starting with `prefix`, in no particular order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Add or rescore `member` in the sorted index `index`.
    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<()>;

    /// Members of `index` whose score is at most `max_score`.
    async fn index_due(&self, index: &str, max_score: i64) -> Result<Vec<String>>;

    /// Remove `member` from `index`. No-op if absent.
    async fn index_remove(&self, index: &str, member: &str) -> Result<()>;
}
