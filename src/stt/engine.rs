//! Core STT engine trait and the whisper-backed implementation.
//!
//! [`SttEngine`] is the interface the inference worker drives.  It is
//! object-safe and `Send + Sync` so a loaded engine can be handed to the
//! worker thread behind an `Arc<dyn SttEngine>`.
//!
//! [`MockSttEngine`] (test builds only) returns a pre-configured response —
//! the worker and bridge tests run against it with no GGML model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the STT subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or per-call state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// The supplied audio buffer is shorter than the minimum 0.5 s
    /// (8 000 samples at 16 kHz).
    #[error("audio too short — minimum 0.5 s of 16 kHz audio")]
    AudioTooShort,

    /// The supplied audio buffer exceeds the maximum 60 s
    /// (960 000 samples at 16 kHz).
    #[error("audio too long — maximum 60 s of 16 kHz audio")]
    AudioTooLong,
}

// ---------------------------------------------------------------------------
// Audio length constants (16 kHz mono f32)
// ---------------------------------------------------------------------------

/// Minimum audio length: 0.5 s × 16 000 Hz.
pub(crate) const MIN_AUDIO_SAMPLES: usize = 8_000;
/// Maximum audio length: 60 s × 16 000 Hz.
pub(crate) const MAX_AUDIO_SAMPLES: usize = 960_000;

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text engines.
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples.
/// - Returns `Err(SttError::AudioTooShort)` when `audio.len() < 8_000`.
/// - Returns `Err(SttError::AudioTooLong)` when `audio.len() > 960_000`.
pub trait SttEngine: Send + Sync {
    /// Transcribe `audio` and return the text transcript.
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn SttEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

// ---------------------------------------------------------------------------
// EngineParams
// ---------------------------------------------------------------------------

/// Inference parameters for [`WhisperEngine`].
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// ISO-639-1 language code, or `"auto"` for whisper's own detection.
    pub language: String,
    /// Threads for the inference pass.
    pub n_threads: i32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            n_threads: optimal_threads(),
        }
    }
}

/// Half the available cores, clamped to `1..=8` — whisper scales poorly past
/// that on consumer CPUs.
pub fn optimal_threads() -> i32 {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    ((cores / 2).clamp(1, 8)) as i32
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production STT engine wrapping a `whisper_rs::WhisperContext`.
///
/// A fresh `WhisperState` is created per [`transcribe`] call so the engine is
/// shareable across threads without locking.
///
/// [`transcribe`]: SttEngine::transcribe
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: EngineParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send`/`Sync` in whisper-rs — the model weights are read-only
// after loading, and `EngineParams` is fully owned.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: EngineParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        Ok(Self { ctx, params })
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong);
        }

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // set_language takes an Option<&str> whose lifetime is tied to fp.
        // Both fp and the borrow of self.params.language stay alive until
        // state.full() returns, so the borrow is valid.
        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg_text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&seg_text);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response without loading any
/// model file.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<String, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    /// Create a mock that always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        // Enforce the audio-length contract even in the mock so callers are
        // tested against it.
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong);
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
