//! Error types for the analysis crate.

use thiserror::Error;

/// Result type alias using the analysis error type.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Error type for media analysis and chat generation.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The media file could not be handed to the backend.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The backend reported that processing the media failed.
    #[error("Video processing failed: {name}")]
    ProcessingFailed { name: String },

    /// The media was still processing after the last poll.
    #[error("Video processing did not finish after {attempts} polls")]
    ProcessingTimeout { attempts: u32 },

    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The provider answered without any text.
    #[error("Empty response from backend")]
    EmptyResponse,
}

impl AnalysisError {
    /// Returns true if the failure happened before generation started.
    pub fn is_media_error(&self) -> bool {
        matches!(
            self,
            Self::Upload(_) | Self::ProcessingFailed { .. } | Self::ProcessingTimeout { .. }
        )
    }
}
