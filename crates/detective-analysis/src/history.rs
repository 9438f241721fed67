//! Chat transcript entries and the recent-conversation context block.

use serde::{Deserialize, Serialize};

/// One entry of a session's chat transcript.
///
/// Serialized as `{"user": "..."}` or `{"ai": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessage {
    User(String),
    Ai(String),
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(text.into())
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::Ai(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::User(text) | Self::Ai(text) => text,
        }
    }
}

/// Parse a stored transcript, skipping entries of unknown shape.
pub fn parse_transcript(value: &serde_json::Value) -> Vec<ChatMessage> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// How much of the transcript is replayed into a chat prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// History is included only when it holds more messages than this.
    pub threshold: usize,
    /// Number of most recent messages included.
    pub window: usize,
    /// Agent replies are cut to this many characters.
    pub excerpt_chars: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            threshold: 2,
            window: 6,
            excerpt_chars: 200,
        }
    }
}

impl HistoryWindow {
    /// Render the recent conversation block, or an empty string when the
    /// transcript is too short to matter.
    pub fn render(&self, history: &[ChatMessage]) -> String {
        if history.len() <= self.threshold {
            return String::new();
        }

        let start = history.len().saturating_sub(self.window);
        let mut out = String::from("\n\n### Recent Conversation Context:\n");
        for message in &history[start..] {
            match message {
                ChatMessage::User(text) => {
                    out.push_str("User: ");
                    out.push_str(text);
                }
                ChatMessage::Ai(text) => {
                    out.push_str("Agent: ");
                    out.extend(text.chars().take(self.excerpt_chars));
                    out.push_str("...");
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let messages = vec![ChatMessage::user("what happens?"), ChatMessage::ai("a cat")];
        let value = serde_json::to_value(&messages).unwrap();
        assert_eq!(value, json!([{"user": "what happens?"}, {"ai": "a cat"}]));
    }

    #[test]
    fn test_parse_transcript_skips_unknown() {
        let value = json!([{"user": "hi"}, {"system": "x"}, 7, {"ai": "hello"}]);
        assert_eq!(
            parse_transcript(&value),
            vec![ChatMessage::user("hi"), ChatMessage::ai("hello")]
        );
        assert!(parse_transcript(&json!("not a list")).is_empty());
    }

    #[test]
    fn test_short_history_omitted() {
        let window = HistoryWindow::default();
        let history = vec![ChatMessage::user("q"), ChatMessage::ai("a")];
        assert_eq!(window.render(&history), "");
    }

    #[test]
    fn test_window_keeps_last_messages() {
        let window = HistoryWindow::default();
        let history: Vec<_> = (0..8).map(|i| ChatMessage::user(format!("q{i}"))).collect();

        let rendered = window.render(&history);
        assert!(!rendered.contains("User: q1\n"));
        assert!(rendered.contains("User: q2\n"));
        assert!(rendered.ends_with("User: q7\n"));
        assert_eq!(rendered.matches("User: ").count(), 6);
    }

    #[test]
    fn test_agent_replies_truncated() {
        let window = HistoryWindow {
            threshold: 0,
            window: 6,
            excerpt_chars: 5,
        };
        let history = vec![ChatMessage::ai("héllo world"), ChatMessage::ai("ok")];

        let rendered = window.render(&history);
        assert!(rendered.contains("Agent: héllo...\n"));
        assert!(rendered.contains("Agent: ok...\n"));
    }
}
