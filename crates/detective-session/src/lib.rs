//! Session records, expiry and artifact cleanup.
//!
//! This crate owns the lifecycle of an investigation session:
//! - Session data is flattened into tagged string fields and kept in a
//!   key-value store under `session:<id>` with a per-key TTL
//! - An expiry index tracks when each session is due, so expired sessions
//!   are torn down reliably rather than by polling for a zero TTL
//! - Uploads, screenshots and clips are removed on teardown or once they
//!   outlive the retention window
//!
//! # Example
//!
//! ```rust,ignore
//! use detective_session::{RedisStore, SessionConfig, SessionManager};
//!
//! let store = RedisStore::connect("redis://127.0.0.1:6379", 16)?;
//! let sessions = SessionManager::new(store, SessionConfig::default());
//!
//! let id = sessions.create();
//! sessions.save(&id, &data).await;
//! let data = sessions.load(&id).await;
//! sessions.teardown(&id).await;
//! ```

mod config;
mod error;
mod expiry;
mod lifecycle;
pub mod record;
pub mod store;
mod sweeper;

pub use config::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_KEY_PREFIX, DEFAULT_SESSION_TTL, DEFAULT_UPLOAD_DIR,
    DEFAULT_UPLOAD_RETENTION, SessionConfig,
};
pub use error::{Error, Result};
pub use expiry::ExpiryIndex;
pub use lifecycle::{MaintenanceReport, SessionManager, SweepSummary};
pub use record::SessionData;
pub use store::{FieldMap, KeyTtl, KeyValueStore, MemoryStore, RedisStore};
pub use sweeper::{ArtifactRole, ArtifactSweeper, SweepFailure, SweepReport, artifact_name};
