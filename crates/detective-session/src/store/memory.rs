//! In-process store with per-key deadlines.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{FieldMap, KeyTtl, KeyValueStore};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Entry {
    fields: FieldMap,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    indexes: HashMap<String, HashMap<String, i64>>,
}

impl Inner {
    /// Drop `key` if its deadline has passed, mirroring lazy expiry.
    fn purge_if_expired(&mut self, key: &str, now: Instant) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|deadline| deadline <= now);
        if expired {
            self.entries.remove(key);
        }
    }

    fn purge_all_expired(&mut self, now: Instant) {
        self.entries
            .retain(|_, e| e.expires_at.is_none_or(|deadline| deadline > now));
    }
}

/// [`KeyValueStore`] kept entirely in memory.
///
/// Deadlines run on the tokio clock, so tests can pause and advance time.
/// Cloning shares the underlying data. [`set_available`](Self::set_available)
/// makes every operation fail as if the remote service were down.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.purge_all_expired(Instant::now());
        inner.entries.len()
    }

    /// Check if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove any expiry from `key`, as a record written without a TTL would be.
    pub fn persist(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.purge_if_expired(key, Instant::now());
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.expires_at = None;
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, fields: &FieldMap) -> Result<()> {
        self.check()?;
        if fields.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        inner.purge_if_expired(key, Instant::now());
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            fields: FieldMap::new(),
            expires_at: None,
        });
        entry
            .fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        self.check()?;
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge_if_expired(key, now);
        if ttl.is_zero() {
            inner.entries.remove(key);
        } else if let Some(entry) = inner.entries.get_mut(key) {
            entry.expires_at = now.checked_add(ttl);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<FieldMap> {
        self.check()?;
        let mut inner = self.inner.lock();
        inner.purge_if_expired(key, Instant::now());
        Ok(inner
            .entries
            .get(key)
            .map(|e| e.fields.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.lock().entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check()?;
        let mut inner = self.inner.lock();
        inner.purge_all_expired(Instant::now());
        Ok(inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.check()?;
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge_if_expired(key, now);
        Ok(match inner.entries.get(key) {
            None => KeyTtl::Absent,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::NoExpiry,
            Some(Entry {
                expires_at: Some(deadline),
                ..
            }) => {
                // Round to the nearest second like Redis does.
                let remaining = deadline.saturating_duration_since(now);
                KeyTtl::Remaining(((remaining.as_millis() + 500) / 1000) as u64)
            }
        })
    }

    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .indexes
            .entry(index.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn index_due(&self, index: &str, max_score: i64) -> Result<Vec<String>> {
        self.check()?;
        let inner = self.inner.lock();
        let Some(members) = inner.indexes.get(index) else {
            return Ok(Vec::new());
        };
        let mut due: Vec<(&String, i64)> = members
            .iter()
            .filter(|(_, score)| **score <= max_score)
            .map(|(m, s)| (m, *s))
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(due.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        if let Some(members) = inner.indexes.get_mut(index) {
            members.remove(member);
            if members.is_empty() {
                inner.indexes.remove(index);
            }
        }
        Ok(())
    }
}
