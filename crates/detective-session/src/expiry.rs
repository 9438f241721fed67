//! Explicit expiry index.
//!
//! Polling a key's remaining TTL for "exactly zero" misses almost every
//! expiry: the store drops the key long before a sweep sees it at zero.
//! Instead every save records `(session_id, due_timestamp)` in a sorted
//! index, and the sweep tears down whatever is due.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::store::KeyValueStore;

/// Sorted index of session ids scored by their due unix timestamp.
#[derive(Debug, Clone)]
pub struct ExpiryIndex {
    key: String,
}

impl ExpiryIndex {
    /// Create an index stored under `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The store key holding the index.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record (or move) the due time of a session.
    pub async fn schedule<S>(&self, store: &S, session_id: &str, due: DateTime<Utc>) -> Result<()>
    where
        S: KeyValueStore + ?Sized,
    {
        store.index_add(&self.key, session_id, due.timestamp()).await
    }

    /// Sessions due at or before `now`, earliest first.
    pub async fn due<S>(&self, store: &S, now: DateTime<Utc>) -> Result<Vec<String>>
    where
        S: KeyValueStore + ?Sized,
    {
        store.index_due(&self.key, now.timestamp()).await
    }

    /// Forget a session.
    pub async fn unschedule<S>(&self, store: &S, session_id: &str) -> Result<()>
    where
        S: KeyValueStore + ?Sized,
    {
        store.index_remove(&self.key, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[tokio::test]
    async fn test_due_respects_timestamps() {
        let store = MemoryStore::new();
        let index = ExpiryIndex::new("session-expiry");
        let now = Utc::now();

        index.schedule(&store, "past", now - Duration::seconds(5)).await.unwrap();
        index.schedule(&store, "now", now).await.unwrap();
        index.schedule(&store, "future", now + Duration::seconds(60)).await.unwrap();

        assert_eq!(index.due(&store, now).await.unwrap(), vec!["past", "now"]);

        index.unschedule(&store, "past").await.unwrap();
        assert_eq!(index.due(&store, now).await.unwrap(), vec!["now"]);

        let later = now + Duration::seconds(61);
        assert_eq!(index.due(&store, later).await.unwrap(), vec!["now", "future"]);
    }

    #[tokio::test]
    async fn test_reschedule_moves_due_time() {
        let store = MemoryStore::new();
        let index = ExpiryIndex::new("idx");
        let now = Utc::now();

        index.schedule(&store, "s", now).await.unwrap();
        index.schedule(&store, "s", now + Duration::seconds(30)).await.unwrap();

        assert!(index.due(&store, now).await.unwrap().is_empty());
    }
}
