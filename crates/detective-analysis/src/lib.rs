//! Media analysis collaborator for Detective.
//!
//! The [`MediaBackend`] trait abstracts the remote multimodal model: upload a
//! video, poll until it is processed, generate text. [`Analyst`] drives that
//! flow and owns the chat-context rules (which part of the transcript is
//! replayed, and how agent replies are shortened).
//!
//! No concrete HTTP backend ships with this crate; [`MockBackend`] stands in
//! for tests.

pub mod analyst;
pub mod backend;
pub mod error;
pub mod history;

pub use analyst::{ANALYSIS_ERROR_PREFIX, Analyst, AnalystConfig, CHAT_APOLOGY};
pub use backend::{
    GenerationParams, GenerationRequest, MediaBackend, MediaHandle, MediaState, MockBackend,
    SharedBackend,
};
pub use error::{AnalysisError, Result};
pub use history::{ChatMessage, HistoryWindow, parse_transcript};
