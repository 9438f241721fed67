//! Session lifecycle: create, save, load, teardown and expiry sweeps.
//!
//! A session moves `absent -> active -> (expired | torn down) -> absent`.
//! Reads and writes degrade instead of failing: if the store is unreachable
//! a load returns empty data and a save reports `false`, with the cause
//! logged. Teardown removes both the store record and every file the session
//! owns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Error;
use crate::expiry::ExpiryIndex;
use crate::record::{self, SessionData};
use crate::store::{FieldMap, KeyTtl, KeyValueStore};
use crate::sweeper::{ArtifactSweeper, SweepReport};

/// Outcome of an expired-session sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Session keys inspected.
    pub scanned: usize,
    /// Keys found without a TTL that had the default applied.
    pub healed: usize,
    /// Sessions torn down.
    pub torn_down: usize,
    /// Sessions whose inspection or teardown failed.
    pub failed: usize,
}

/// Outcome of a full maintenance pass.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    /// Expired-session sweep results.
    pub sessions: SweepSummary,
    /// Old-upload sweep results.
    pub uploads: SweepReport,
}

/// Coordinates session records in the store with their files on disk.
///
/// Cloning is cheap; clones share the same store.
pub struct SessionManager<S: KeyValueStore> {
    store: Arc<S>,
    sweeper: ArtifactSweeper,
    expiry: ExpiryIndex,
    config: SessionConfig,
}

impl<S: KeyValueStore> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sweeper: self.sweeper.clone(),
            expiry: self.expiry.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> SessionManager<S> {
    /// Create a manager over `store`.
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a manager over a store shared with other components.
    pub fn with_shared_store(store: Arc<S>, config: SessionConfig) -> Self {
        Self {
            sweeper: ArtifactSweeper::new(&config.upload_dir),
            expiry: ExpiryIndex::new(config.expiry_index_key()),
            store,
            config,
        }
    }

    /// Replace the artifact sweeper.
    pub fn with_sweeper(mut self, sweeper: ArtifactSweeper) -> Self {
        self.sweeper = sweeper;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the artifact sweeper.
    pub fn sweeper(&self) -> &ArtifactSweeper {
        &self.sweeper
    }

    /// Allocate a new session id. Nothing is written until [`save`](Self::save).
    pub fn create(&self) -> String {
        let id = record::new_id();
        debug!(session_id = %id, "Created session id");
        id
    }

    /// Write `data` into the session and reset its TTL.
    ///
    /// Fields not named in `data` keep their stored values. Returns `false`
    /// if the store could not be written.
    pub async fn save(&self, session_id: &str, data: &SessionData) -> bool {
        match self.try_save(session_id, data).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to save session");
                false
            }
        }
    }

    async fn try_save(&self, session_id: &str, data: &SessionData) -> crate::Result<()> {
        let key = self.config.session_key(session_id);
        let ttl = self.config.session_ttl;
        let due = due_after(Utc::now(), ttl)?;

        self.store.put(&key, &record::encode(data)).await?;
        self.store.set_ttl(&key, ttl).await?;
        self.expiry
            .schedule(self.store.as_ref(), session_id, due)
            .await?;

        if let Some(path) = record::filepath(data) {
            let side_key = self.config.artifacts_key(session_id);
            let mut fields = FieldMap::new();
            fields.insert(record::FILEPATH.to_string(), path.display().to_string());
            self.store.put(&side_key, &fields).await?;
            self.store
                .set_ttl(&side_key, self.config.artifacts_ttl())
                .await?;
        }

        debug!(session_id = %session_id, fields = data.len(), "Saved session");
        Ok(())
    }

    /// Write a single field into the session.
    pub async fn update(&self, session_id: &str, field: &str, value: Value) -> bool {
        let mut data = SessionData::new();
        data.insert(field.to_string(), value);
        self.save(session_id, &data).await
    }

    /// Read the session's data.
    ///
    /// A missing session, an unreachable store and an empty record all
    /// produce an empty map.
    pub async fn load(&self, session_id: &str) -> SessionData {
        match self.store.get(&self.config.session_key(session_id)).await {
            Ok(fields) => record::decode(&fields),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load session");
                SessionData::new()
            }
        }
    }

    /// Remaining lifetime of the session's store key.
    pub async fn ttl(&self, session_id: &str) -> KeyTtl {
        match self.store.ttl(&self.config.session_key(session_id)).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to read session TTL");
                KeyTtl::Absent
            }
        }
    }

    /// Ids of every session currently in the store.
    pub async fn list_sessions(&self) -> Vec<String> {
        match self.store.list_keys(&self.session_key_prefix()).await {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| self.config.session_id_from_key(key))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list sessions");
                Vec::new()
            }
        }
    }

    /// Remove a session's record and every file it owns.
    ///
    /// Returns `false` when the store could not be read or the record could
    /// not be deleted. File deletion failures are logged and do not change
    /// the result. Tearing down an absent session succeeds.
    pub async fn teardown(&self, session_id: &str) -> bool {
        // An empty id would match every session's evidence prefix.
        if session_id.is_empty() {
            debug!("Ignoring teardown of empty session id");
            return true;
        }

        let key = self.config.session_key(session_id);
        let side_key = self.config.artifacts_key(session_id);
        let mut ok = true;

        let primary = match self.primary_upload(session_id, &key, &side_key).await {
            Ok(path) => path,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to read session before teardown");
                ok = false;
                None
            }
        };

        let sweeper = self.sweeper.clone();
        let id = session_id.to_string();
        match tokio::task::spawn_blocking(move || sweeper.sweep_session(&id, primary.as_deref()))
            .await
        {
            Ok(report) if !report.is_clean() => {
                warn!(
                    session_id = %session_id,
                    failed = report.failed.len(),
                    "Some session files could not be deleted"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Artifact sweep task failed");
                ok = false;
            }
        }

        for k in [&key, &side_key] {
            if let Err(e) = self.store.delete(k).await {
                warn!(session_id = %session_id, key = %k, error = %e, "Failed to delete session key");
                ok = false;
            }
        }

        if let Err(e) = self.expiry.unschedule(self.store.as_ref(), session_id).await {
            warn!(session_id = %session_id, error = %e, "Failed to remove session from expiry index");
            ok = false;
        }

        if ok {
            info!(session_id = %session_id, "Session torn down");
        }
        ok
    }

    /// Primary upload path, from the record or from the side record that
    /// outlives it.
    async fn primary_upload(
        &self,
        session_id: &str,
        key: &str,
        side_key: &str,
    ) -> crate::Result<Option<PathBuf>> {
        let data = record::decode(&self.store.get(key).await?);
        if let Some(path) = record::filepath(&data) {
            return Ok(Some(path));
        }

        let side = self.store.get(side_key).await?;
        let path = side
            .get(record::FILEPATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        if path.is_some() {
            debug!(session_id = %session_id, "Recovered primary upload from artifacts record");
        }
        Ok(path)
    }

    /// Sweep expired sessions as of now.
    pub async fn sweep_expired_sessions(&self) -> SweepSummary {
        self.sweep_expired_sessions_at(Utc::now()).await
    }

    /// Sweep expired sessions as of `now`.
    ///
    /// Two passes:
    /// 1. Every session key is checked. Keys without a TTL get the default
    ///    one, keys reporting exactly zero seconds left are torn down.
    /// 2. Every session the expiry index reports due is torn down, unless its
    ///    key is still alive, in which case it is rescheduled.
    pub async fn sweep_expired_sessions_at(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let mut torn_down: Vec<String> = Vec::new();

        match self.store.list_keys(&self.session_key_prefix()).await {
            Ok(keys) => {
                for key in keys {
                    let Some(session_id) = self.config.session_id_from_key(&key) else {
                        continue;
                    };
                    summary.scanned += 1;

                    match self.store.ttl(&key).await {
                        Ok(KeyTtl::NoExpiry) => {
                            if self.heal(&key, session_id, now).await {
                                summary.healed += 1;
                            } else {
                                summary.failed += 1;
                            }
                        }
                        Ok(KeyTtl::Absent) => {}
                        Ok(KeyTtl::Remaining(0)) => {
                            if self.teardown(session_id).await {
                                summary.torn_down += 1;
                                torn_down.push(session_id.to_string());
                            } else {
                                summary.failed += 1;
                            }
                        }
                        Ok(KeyTtl::Remaining(_)) => {}
                        Err(e) => {
                            warn!(key = %key, error = %e, "Failed to read TTL");
                            summary.failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to list session keys");
                summary.failed += 1;
            }
        }

        match self.expiry.due(self.store.as_ref(), now).await {
            Ok(due) => {
                for session_id in due {
                    if torn_down.contains(&session_id) {
                        continue;
                    }
                    let key = self.config.session_key(&session_id);
                    match self.store.ttl(&key).await {
                        Ok(KeyTtl::Remaining(secs)) if secs > 0 => {
                            let rescheduled = match due_after(now, Duration::from_secs(secs)) {
                                Ok(due) => {
                                    self.expiry
                                        .schedule(self.store.as_ref(), &session_id, due)
                                        .await
                                }
                                Err(e) => Err(e),
                            };
                            if let Err(e) = rescheduled {
                                warn!(session_id = %session_id, error = %e, "Failed to reschedule session");
                                summary.failed += 1;
                            }
                        }
                        // Healed above, or persisted by someone else; leave it be.
                        Ok(KeyTtl::NoExpiry) => {}
                        Ok(_) => {
                            if self.teardown(&session_id).await {
                                summary.torn_down += 1;
                            } else {
                                summary.failed += 1;
                            }
                        }
                        Err(e) => {
                            warn!(session_id = %session_id, error = %e, "Failed to read TTL");
                            summary.failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read expiry index");
                summary.failed += 1;
            }
        }

        info!(
            scanned = summary.scanned,
            healed = summary.healed,
            torn_down = summary.torn_down,
            failed = summary.failed,
            "Expired sessions cleanup completed"
        );
        summary
    }

    /// Apply the default TTL to a key that has none and index it.
    async fn heal(&self, key: &str, session_id: &str, now: DateTime<Utc>) -> bool {
        let ttl = self.config.session_ttl;
        let result: crate::Result<()> = async {
            let due = due_after(now, ttl)?;
            self.store.set_ttl(key, ttl).await?;
            self.expiry
                .schedule(self.store.as_ref(), session_id, due)
                .await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(session_id = %session_id, ttl_secs = ttl.as_secs(), "Applied default TTL");
                true
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to apply default TTL");
                false
            }
        }
    }

    /// Remove uploads older than the retention window, as of now.
    pub async fn sweep_old_uploads(&self) -> SweepReport {
        self.sweep_old_uploads_at(SystemTime::now()).await
    }

    /// Remove uploads modified before `now - upload_retention`.
    pub async fn sweep_old_uploads_at(&self, now: SystemTime) -> SweepReport {
        let cutoff = now
            .checked_sub(self.config.upload_retention)
            .unwrap_or(UNIX_EPOCH);
        let sweeper = self.sweeper.clone();

        match tokio::task::spawn_blocking(move || sweeper.sweep_expired(cutoff)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Upload sweep task failed");
                SweepReport::default()
            }
        }
    }

    /// Run both sweeps once.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let sessions = self.sweep_expired_sessions().await;
        let uploads = self.sweep_old_uploads().await;
        MaintenanceReport { sessions, uploads }
    }

    /// Spawn a task that runs [`run_maintenance`](Self::run_maintenance)
    /// every `cleanup_interval` until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub fn spawn_cleanup_task(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let manager = self.clone();
        let period = self.config.cleanup_interval;

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        info!("Running periodic cleanup");
                        manager.run_maintenance().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Cleanup task stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    fn session_key_prefix(&self) -> String {
        format!("{}:", self.config.key_prefix)
    }
}

fn due_after(now: DateTime<Utc>, ttl: Duration) -> crate::Result<DateTime<Utc>> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| Error::InvalidConfig(format!("TTL of {}s is out of range", ttl.as_secs())))
}
