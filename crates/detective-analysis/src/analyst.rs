//! Media analysis and follow-up chat on top of a [`MediaBackend`].
//!
//! Neither entry point fails: an analysis failure becomes the text
//! `"Error analyzing video: <reason>"` and a chat failure becomes a fixed
//! apology, so callers can store the result as-is.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{GenerationParams, GenerationRequest, MediaBackend, MediaHandle, MediaState};
use crate::error::{AnalysisError, Result};
use crate::history::{ChatMessage, HistoryWindow};

/// Prefix of the text returned when analysis fails.
pub const ANALYSIS_ERROR_PREFIX: &str = "Error analyzing video: ";

/// Reply used when a chat turn cannot be generated.
pub const CHAT_APOLOGY: &str = "I apologize, but I'm having trouble reaching the video analysis \
right now. Please ask your question again, or re-analyze the video if the problem persists.";

/// Analyst configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalystConfig {
    /// Model identifier passed on every request.
    pub model: String,
    /// Delay between media state polls.
    pub poll_interval: Duration,
    /// Polls before processing is considered stuck.
    pub max_poll_attempts: u32,
    pub analysis_params: GenerationParams,
    pub chat_params: GenerationParams,
    pub history: HistoryWindow,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 90,
            analysis_params: GenerationParams::analysis(),
            chat_params: GenerationParams::chat(),
            history: HistoryWindow::default(),
        }
    }
}

/// Runs analyses and chat turns against a backend.
pub struct Analyst<B: MediaBackend + ?Sized> {
    backend: Arc<B>,
    config: AnalystConfig,
}

impl<B: MediaBackend + ?Sized> Clone for Analyst<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl<B: MediaBackend + ?Sized> Analyst<B> {
    pub fn new(backend: Arc<B>, config: AnalystConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Analyze a media file with the given prompt.
    ///
    /// Returns the model's text, or the error text on any failure.
    pub async fn analyze_media(&self, path: &Path, prompt: &str) -> String {
        match self.try_analyze_media(path, prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    path = %path.display(),
                    error = %e,
                    "Media analysis failed"
                );
                format!("{ANALYSIS_ERROR_PREFIX}{e}")
            }
        }
    }

    /// Analyze a media file, surfacing the failure.
    pub async fn try_analyze_media(&self, path: &Path, prompt: &str) -> Result<String> {
        let handle = self.backend.upload(path).await?;
        let handle = self.wait_until_processed(handle).await?;
        tracing::info!(media = %handle.name, "Media processing complete");

        let request = GenerationRequest::new(&self.config.model, self.config.analysis_params.clone())
            .with_media(handle)
            .with_part(prompt);

        self.backend
            .generate(request)
            .await?
            .ok_or(AnalysisError::EmptyResponse)
    }

    /// Produce a chat reply.
    ///
    /// `context` carries the analysis and instructions; `message` is the
    /// user's question. `history` is the transcript including `message`.
    pub async fn chat_reply(&self, context: &str, message: &str, history: &[ChatMessage]) -> String {
        match self.try_chat_reply(context, message, history).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "Chat reply failed");
                CHAT_APOLOGY.to_string()
            }
        }
    }

    /// Produce a chat reply, surfacing the failure.
    pub async fn try_chat_reply(
        &self,
        context: &str,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let prompt = format!(
            "{context}\n\n### User Question:\n{message}{}",
            self.config.history.render(history)
        );
        let request = GenerationRequest::new(&self.config.model, self.config.chat_params.clone())
            .with_part(prompt);

        self.backend
            .generate(request)
            .await?
            .ok_or(AnalysisError::EmptyResponse)
    }

    async fn wait_until_processed(&self, mut handle: MediaHandle) -> Result<MediaHandle> {
        let mut attempts = 0;
        while handle.is_processing() {
            if attempts >= self.config.max_poll_attempts {
                return Err(AnalysisError::ProcessingTimeout { attempts });
            }
            tracing::debug!(media = %handle.name, attempt = attempts + 1, "Waiting for media processing");
            tokio::time::sleep(self.config.poll_interval).await;
            handle = self.backend.refresh(&handle).await?;
            attempts += 1;
        }

        match handle.state {
            MediaState::Failed => Err(AnalysisError::ProcessingFailed { name: handle.name }),
            _ => Ok(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn setup(backend: MockBackend) -> (Arc<MockBackend>, Analyst<MockBackend>) {
        let backend = Arc::new(backend);
        let analyst = Analyst::new(Arc::clone(&backend), AnalystConfig::default());
        (backend, analyst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_waits_for_processing() {
        let (backend, analyst) = setup(
            MockBackend::with_text("a red car turns left at 0:04").with_states([
                MediaState::Processing,
                MediaState::Processing,
                MediaState::Active,
            ]),
        );

        let started = tokio::time::Instant::now();
        let text = analyst.analyze_media(Path::new("up/abc.mp4"), "describe").await;

        assert_eq!(text, "a red car turns left at 0:04");
        assert_eq!(backend.refresh_count(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(20));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parts, vec!["describe".to_string()]);
        assert_eq!(requests[0].params, GenerationParams::analysis());
        let media = requests[0].media.as_ref().unwrap();
        assert_eq!(media.state, MediaState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_failure_becomes_text() {
        let (backend, analyst) =
            setup(MockBackend::new().with_states([MediaState::Processing, MediaState::Failed]));

        let text = analyst.analyze_media(Path::new("x.mp4"), "p").await;
        assert_eq!(text, "Error analyzing video: Video processing failed: files/1");
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_timeout() {
        let backend = Arc::new(MockBackend::new().with_states([MediaState::Processing; 10]));
        let config = AnalystConfig {
            max_poll_attempts: 3,
            ..Default::default()
        };
        let analyst = Analyst::new(Arc::clone(&backend), config);

        let err = analyst
            .try_analyze_media(Path::new("x.mp4"), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ProcessingTimeout { attempts: 3 }));
        assert_eq!(backend.refresh_count(), 3);
    }

    #[tokio::test]
    async fn test_upload_and_empty_response_errors() {
        let (_, analyst) =
            setup(MockBackend::new().fail_upload(AnalysisError::Upload("too large".to_string())));
        let text = analyst.analyze_media(Path::new("x.mp4"), "p").await;
        assert!(text.starts_with(ANALYSIS_ERROR_PREFIX));
        assert!(text.ends_with("too large"));

        let (_, analyst) = setup(MockBackend::new().respond(Ok(None)));
        let err = analyst
            .try_analyze_media(Path::new("x.mp4"), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_chat_reply_includes_history_window() {
        let (backend, analyst) = setup(MockBackend::with_text("At 0:04."));
        let history = vec![
            ChatMessage::user("what car?"),
            ChatMessage::ai("A red sedan."),
            ChatMessage::user("when does it turn?"),
        ];

        let reply = analyst
            .chat_reply("ANALYSIS", "when does it turn?", &history)
            .await;
        assert_eq!(reply, "At 0:04.");

        let requests = backend.requests();
        let prompt = &requests[0].parts[0];
        assert!(prompt.starts_with("ANALYSIS\n\n### User Question:\nwhen does it turn?"));
        assert!(prompt.contains("Agent: A red sedan....\n"));
        assert_eq!(requests[0].params, GenerationParams::chat());
        assert!(requests[0].media.is_none());
    }

    #[tokio::test]
    async fn test_chat_reply_short_history() {
        let (backend, analyst) = setup(MockBackend::with_text("ok"));
        analyst
            .chat_reply("ctx", "hi", &[ChatMessage::user("hi")])
            .await;
        let prompt = &backend.requests()[0].parts[0];
        assert!(!prompt.contains("Recent Conversation Context"));
    }

    #[tokio::test]
    async fn test_chat_failure_apologizes() {
        let (_, analyst) = setup(
            MockBackend::new().respond(Err(AnalysisError::Backend("503".to_string()))),
        );
        let reply = analyst.chat_reply("ctx", "hi", &[]).await;
        assert_eq!(reply, CHAT_APOLOGY);
    }
}
