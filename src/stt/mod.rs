//! STT (Speech-to-Text) engine module.
//!
//! The inference worker in [`crate::transcribe`] is the only production
//! caller: it resolves a model through [`ModelPaths`], downloads it on first
//! run via [`ensure_model`], loads a [`WhisperEngine`], and serves
//! transcription requests against the [`SttEngine`] trait.

pub mod engine;
pub mod model;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{optimal_threads, EngineParams, SttEngine, SttError, WhisperEngine};
pub use model::{
    ensure_model, find_model_by_id, DownloadProgress, ModelError, ModelInfo, ModelPaths,
    WHISPER_MODELS,
};

// test-only re-export so other modules' test code can import MockSttEngine
// without reaching into `stt::engine`.
#[cfg(test)]
pub use engine::MockSttEngine;
