//! Configuration for the session lifecycle controller.

use std::path::PathBuf;
use std::time::Duration;

/// Default session lifetime (1 hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default age after which uploads are swept regardless of session state (2 hours).
pub const DEFAULT_UPLOAD_RETENTION: Duration = Duration::from_secs(2 * 3600);

/// Default interval between periodic cleanup passes (30 minutes).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(1800);

/// Default shared upload directory.
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";

/// Default namespace for session keys (`session:<id>`).
pub const DEFAULT_KEY_PREFIX: &str = "session";

/// Configuration for [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime applied to a session key on every save.
    pub session_ttl: Duration,

    /// Files in the upload directory older than this are removed by the upload sweep.
    pub upload_retention: Duration,

    /// Shared directory holding uploads, screenshots and clips.
    pub upload_dir: PathBuf,

    /// Namespace for store keys.
    pub key_prefix: String,

    /// Interval for the background cleanup task.
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            upload_retention: DEFAULT_UPLOAD_RETENTION,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session TTL.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the upload retention window.
    pub fn with_upload_retention(mut self, retention: Duration) -> Self {
        self.upload_retention = retention;
        self
    }

    /// Set the shared upload directory.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set the key namespace.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Store key holding a session's fields.
    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }

    /// Recover the session id from a full session key.
    pub fn session_id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|id| !id.is_empty())
    }

    /// Sorted index of session ids scored by their due timestamp.
    pub fn expiry_index_key(&self) -> String {
        format!("{}-expiry", self.key_prefix)
    }

    /// Side record remembering a session's primary upload past its own expiry.
    pub fn artifacts_key(&self, session_id: &str) -> String {
        format!("{}-artifacts:{}", self.key_prefix, session_id)
    }

    /// Lifetime of the artifacts side record.
    pub fn artifacts_ttl(&self) -> Duration {
        self.session_ttl.saturating_add(self.upload_retention)
    }
}
