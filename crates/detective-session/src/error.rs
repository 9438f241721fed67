//! Error types for session store and cleanup operations.

use std::path::PathBuf;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key-value store could not be reached or rejected a command.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store or controller was configured with unusable values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<deadpool_redis::redis::RedisError> for Error {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for Error {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<deadpool_redis::CreatePoolError> for Error {
    fn from(e: deadpool_redis::CreatePoolError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
