//! Media backend trait and a mock implementation.
//!
//! A backend accepts an uploaded media file, reports its processing state,
//! and generates text from prompt parts with the media attached.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AnalysisError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Media Types
// ─────────────────────────────────────────────────────────────────────────────

/// Processing state of uploaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    /// The provider is still ingesting the file.
    Processing,
    /// The file can be referenced in generation requests.
    Active,
    /// The provider gave up on the file.
    Failed,
}

/// Reference to media held by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    /// Provider-side name, used to refresh the state.
    pub name: String,
    /// Provider-side URI, if one has been assigned.
    pub uri: Option<String>,
    /// Last observed state.
    pub state: MediaState,
}

impl MediaHandle {
    pub fn new(name: impl Into<String>, state: MediaState) -> Self {
        Self {
            name: name.into(),
            uri: None,
            state,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.state == MediaState::Processing
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Request
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling parameters for a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub candidate_count: u32,
}

impl GenerationParams {
    /// Parameters for the initial, long-form media analysis.
    pub fn analysis() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 32768,
            candidate_count: 1,
        }
    }

    /// Parameters for follow-up chat replies.
    pub fn chat() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 8192,
            ..Self::analysis()
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::analysis()
    }
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier.
    pub model: String,
    /// Prompt parts, in order.
    pub parts: Vec<String>,
    /// Media the prompt refers to.
    pub media: Option<MediaHandle>,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            model: model.into(),
            parts: Vec::new(),
            media: None,
            params,
        }
    }

    /// Append a prompt part.
    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Attach processed media.
    pub fn with_media(mut self, media: MediaHandle) -> Self {
        self.media = Some(media);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for remote multimodal model providers.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Hand a local media file to the provider.
    async fn upload(&self, path: &Path) -> Result<MediaHandle>;

    /// Fetch the current state of previously uploaded media.
    async fn refresh(&self, handle: &MediaHandle) -> Result<MediaHandle>;

    /// Generate text. `None` means the provider returned no text.
    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn MediaBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing purposes.
///
/// Refreshes walk through a scripted list of states; once the list is
/// exhausted the media reports `Active`. Generation results are returned in
/// order and an error is returned when none are left.
#[derive(Debug, Default)]
pub struct MockBackend {
    upload_error: Mutex<Option<AnalysisError>>,
    states: Mutex<VecDeque<MediaState>>,
    responses: Mutex<VecDeque<Result<Option<String>>>>,
    uploads: Mutex<Vec<PathBuf>>,
    refreshes: Mutex<u32>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers every generation with `text`, once.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new().respond(Ok(Some(text.into())))
    }

    /// Queue a generation result.
    pub fn respond(self, response: Result<Option<String>>) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    /// States reported by successive refreshes.
    pub fn with_states(self, states: impl IntoIterator<Item = MediaState>) -> Self {
        self.states.lock().extend(states);
        self
    }

    /// Make the next upload fail.
    pub fn fail_upload(self, error: AnalysisError) -> Self {
        *self.upload_error.lock() = Some(error);
        self
    }

    /// Paths passed to `upload`.
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().clone()
    }

    /// Number of `refresh` calls made.
    pub fn refresh_count(&self) -> u32 {
        *self.refreshes.lock()
    }

    /// All generation requests made.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    async fn upload(&self, path: &Path) -> Result<MediaHandle> {
        self.uploads.lock().push(path.to_path_buf());
        if let Some(err) = self.upload_error.lock().take() {
            return Err(err);
        }

        let name = format!("files/{}", self.uploads.lock().len());
        let state = self
            .states
            .lock()
            .pop_front()
            .unwrap_or(MediaState::Active);
        Ok(MediaHandle::new(name, state))
    }

    async fn refresh(&self, handle: &MediaHandle) -> Result<MediaHandle> {
        *self.refreshes.lock() += 1;
        let state = self
            .states
            .lock()
            .pop_front()
            .unwrap_or(MediaState::Active);

        let mut refreshed = handle.clone();
        refreshed.state = state;
        if state == MediaState::Active {
            refreshed.uri = Some(format!("mock://{}", handle.name));
        }
        Ok(refreshed)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>> {
        self.requests.lock().push(request);
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(AnalysisError::Backend(
                "MockBackend: no more responses available".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
