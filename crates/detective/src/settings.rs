//! Conversion from the loaded TOML config into each crate's own settings.

use detective_analysis::{AnalystConfig, GenerationParams, HistoryWindow};
use detective_config::{AnalysisSection, DetectiveConfig};
use detective_session::SessionConfig;

/// Session lifecycle settings from the `[store]`, `[session]` and `[uploads]` sections.
pub fn session_config(config: &DetectiveConfig) -> SessionConfig {
    let store = config.store();
    let session = config.session();
    let uploads = config.uploads();

    SessionConfig::new()
        .with_session_ttl(session.ttl())
        .with_cleanup_interval(session.cleanup_interval())
        .with_key_prefix(store.key_prefix)
        .with_upload_dir(uploads.dir.clone())
        .with_upload_retention(uploads.retention())
}

/// Analyst settings from the `[analysis]` section.
pub fn analyst_config(analysis: &AnalysisSection) -> AnalystConfig {
    let params = |temperature: f32, max_output_tokens: u32| GenerationParams {
        temperature,
        top_p: analysis.top_p,
        top_k: analysis.top_k,
        max_output_tokens,
        candidate_count: 1,
    };

    AnalystConfig {
        model: analysis.model.clone(),
        poll_interval: analysis.poll_interval(),
        max_poll_attempts: analysis.max_poll_attempts,
        analysis_params: params(analysis.temperature, analysis.max_output_tokens),
        chat_params: params(analysis.chat_temperature, analysis.chat_max_tokens),
        history: HistoryWindow {
            threshold: analysis.history_threshold,
            window: analysis.history_window,
            excerpt_chars: analysis.reply_excerpt_chars,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_defaults_line_up() {
        let config = DetectiveConfig::new();

        let session = session_config(&config);
        let expected = SessionConfig::default();
        assert_eq!(session.session_ttl, expected.session_ttl);
        assert_eq!(session.upload_retention, expected.upload_retention);
        assert_eq!(session.upload_dir, expected.upload_dir);
        assert_eq!(session.key_prefix, expected.key_prefix);
        assert_eq!(session.cleanup_interval, expected.cleanup_interval);

        assert_eq!(analyst_config(&config.analysis()), AnalystConfig::default());
    }

    #[test]
    fn test_sections_applied() {
        let config = DetectiveConfig::from_toml(
            r#"
[store]
key_prefix = "staging"

[session]
ttl_secs = 60

[uploads]
dir = "/tmp/up"
retention_secs = 30

[analysis]
model = "other-model"
chat_temperature = 0.5
history_window = 4
"#,
        )
        .unwrap();

        let session = session_config(&config);
        assert_eq!(session.key_prefix, "staging");
        assert_eq!(session.session_ttl, Duration::from_secs(60));
        assert_eq!(session.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(session.upload_retention, Duration::from_secs(30));

        let analyst = analyst_config(&config.analysis());
        assert_eq!(analyst.model, "other-model");
        assert_eq!(analyst.chat_params.temperature, 0.5);
        assert_eq!(analyst.analysis_params.temperature, 0.2);
        assert_eq!(analyst.history.window, 4);
    }
}
