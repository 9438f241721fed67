//! End-to-end session lifecycle tests against the in-memory store.
//!
//! These cover the full absent -> active -> expired/torn down -> absent
//! cycle, including files on disk.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use detective_session::record::{CHAT_HISTORY, FILEPATH};
use detective_session::{
    ArtifactRole, KeyTtl, KeyValueStore, MemoryStore, SessionConfig, SessionData, SessionManager,
    artifact_name,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(3600);

fn manager(dir: &TempDir) -> SessionManager<MemoryStore> {
    let config = SessionConfig::new()
        .with_upload_dir(dir.path())
        .with_session_ttl(TTL)
        .with_upload_retention(Duration::from_secs(2 * 3600));
    SessionManager::new(MemoryStore::new(), config)
}

fn data(pairs: &[(&str, Value)]) -> SessionData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Save / load / teardown
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_load_teardown_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    let expected = data(&[("tags", json!(["a", "b"])), ("name", json!("x"))]);

    assert!(sessions.save("abc123", &expected).await);
    assert_eq!(sessions.load("abc123").await, expected);

    assert!(sessions.teardown("abc123").await);
    assert!(sessions.load("abc123").await.is_empty());
}

#[tokio::test]
async fn test_chat_history_survives_roundtrip() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    let id = sessions.create();

    let history = json!([
        {"user": "What happens at 00:15?"},
        {"ai": "[00:15] A car enters the pit lane."}
    ]);
    sessions.update(&id, CHAT_HISTORY, history.clone()).await;
    sessions
        .update(&id, "analysis_result", json!("{not json, just text"))
        .await;

    let loaded = sessions.load(&id).await;
    assert_eq!(loaded[CHAT_HISTORY], history);
    assert_eq!(loaded["analysis_result"], json!("{not json, just text"));
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    let id = sessions.create();

    let video = touch(dir.path(), "upload.mp4");
    let shot = touch(dir.path(), &artifact_name(ArtifactRole::Screenshot, &id, "1.png"));
    let clip = touch(dir.path(), &artifact_name(ArtifactRole::Clip, &id, "1.mp4"));
    let unrelated = touch(dir.path(), "screenshot_someone-else_1.png");

    sessions
        .save(&id, &data(&[(FILEPATH, json!(video.display().to_string()))]))
        .await;

    assert!(sessions.teardown(&id).await);
    assert!(sessions.teardown(&id).await);

    assert_eq!(sessions.ttl(&id).await, KeyTtl::Absent);
    assert!(sessions.list_sessions().await.is_empty());
    assert!(!video.exists());
    assert!(!shot.exists());
    assert!(!clip.exists());
    assert!(unrelated.exists());
}

#[tokio::test]
async fn test_teardown_of_unknown_session_succeeds() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    assert!(sessions.teardown("never-existed").await);
}

// ─────────────────────────────────────────────────────────────────────────────
// Expiry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_session_expires_after_ttl() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    sessions.save("s", &data(&[("name", json!("x"))])).await;

    assert_eq!(sessions.ttl("s").await, KeyTtl::Remaining(TTL.as_secs()));

    tokio::time::advance(TTL + Duration::from_secs(1)).await;

    assert!(sessions.load("s").await.is_empty());
    assert_eq!(sessions.ttl("s").await, KeyTtl::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_files_removed_via_index() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    let id = sessions.create();

    let video = touch(dir.path(), "upload.mp4");
    let clip = touch(dir.path(), &artifact_name(ArtifactRole::Clip, &id, "3.mp4"));
    sessions
        .save(&id, &data(&[(FILEPATH, json!(video.display().to_string()))]))
        .await;

    // The store drops the record on its own; nothing ever observes TTL 0.
    tokio::time::advance(TTL + Duration::from_secs(5)).await;
    assert!(sessions.load(&id).await.is_empty());

    let now = Utc::now() + chrono::Duration::seconds(TTL.as_secs() as i64 + 5);
    let summary = sessions.sweep_expired_sessions_at(now).await;

    assert_eq!(summary.torn_down, 1);
    assert_eq!(summary.failed, 0);
    assert!(!video.exists());
    assert!(!clip.exists());

    let index = sessions.config().expiry_index_key();
    assert!(
        sessions
            .store()
            .index_due(&index, now.timestamp())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_key_is_torn_down() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    let clip = touch(dir.path(), &artifact_name(ArtifactRole::Clip, "s", "1.mp4"));
    sessions.save("s", &data(&[("name", json!("x"))])).await;

    sessions
        .store()
        .set_ttl("session:s", Duration::from_secs(1))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(sessions.ttl("s").await, KeyTtl::Remaining(0));

    let summary = sessions.sweep_expired_sessions().await;

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.torn_down, 1);
    assert_eq!(sessions.ttl("s").await, KeyTtl::Absent);
    assert!(!clip.exists());
}

#[tokio::test]
async fn test_unexpired_sessions_untouched() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    sessions.save("a", &data(&[("name", json!("x"))])).await;
    sessions.save("b", &data(&[("name", json!("y"))])).await;

    let summary = sessions.sweep_expired_sessions().await;

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.torn_down, 0);
    assert_eq!(summary.healed, 0);
    assert_eq!(sessions.load("a").await["name"], json!("x"));
    assert_eq!(sessions.load("b").await["name"], json!("y"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Upload retention
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sweep_old_uploads_uses_retention_window() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);

    let old = touch(dir.path(), "old.mp4");
    File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3 * 3600))
        .unwrap();
    let recent = touch(dir.path(), "recent.mp4");

    let report = sessions.sweep_old_uploads().await;

    assert_eq!(report.removed, vec![old.clone()]);
    assert!(!old.exists());
    assert!(recent.exists());

    // Seen from three hours in the future, the recent file is old too.
    let later = SystemTime::now() + Duration::from_secs(3 * 3600);
    let report = sessions.sweep_old_uploads_at(later).await;
    assert_eq!(report.removed, vec![recent.clone()]);
}

#[tokio::test]
async fn test_run_maintenance_combines_sweeps() {
    let dir = TempDir::new().unwrap();
    let sessions = manager(&dir);
    sessions.save("s", &data(&[("name", json!("x"))])).await;

    let report = sessions.run_maintenance().await;

    assert_eq!(report.sessions.scanned, 1);
    assert!(report.uploads.is_clean());
    assert!(report.uploads.removed.is_empty());
}
