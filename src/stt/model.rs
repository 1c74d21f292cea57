//! Model registry, path resolution, and first-run download.
//!
//! [`WHISPER_MODELS`] lists the GGML files the local transcription path can
//! run.  [`ModelPaths`] resolves their on-disk location and
//! [`ensure_model`] downloads a missing file from its source URL, reporting
//! byte-level progress through a callback so the worker can forward it to
//! the UI.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// ModelInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single GGML model file.
#[derive(Debug)]
pub struct ModelInfo {
    /// Unique identifier used in `TranscribeConfig::model` (e.g.
    /// `"whisper-base-en"`).
    pub id: &'static str,
    /// Human-readable display name shown in the UI.
    pub display_name: &'static str,
    /// File name under the models directory.
    pub file_name: &'static str,
    /// Approximate file size in megabytes.
    pub file_size_mb: u64,
    /// Direct download URL for the GGML file.
    pub source_url: &'static str,
    /// ISO-639-1 language code, or `"multilingual"`.
    pub language: &'static str,
}

// ---------------------------------------------------------------------------
// Model registry
// ---------------------------------------------------------------------------

/// Whisper GGML models known to the application.
///
/// The English-only base model is the default: small enough for a first-run
/// download while the user watches a progress bar, accurate enough for
/// short service-desk utterances.
pub const WHISPER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "whisper-tiny-en",
        display_name: "Whisper Tiny (English)",
        file_name: "ggml-tiny.en.bin",
        file_size_mb: 75,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.en.bin",
        language: "en",
    },
    ModelInfo {
        id: "whisper-base-en",
        display_name: "Whisper Base (English) [Recommended]",
        file_name: "ggml-base.en.bin",
        file_size_mb: 142,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin",
        language: "en",
    },
    ModelInfo {
        id: "whisper-small",
        display_name: "Whisper Small (Multilingual)",
        file_name: "ggml-small.bin",
        file_size_mb: 466,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
        language: "multilingual",
    },
];

/// Find a [`ModelInfo`] by its `id` string.
pub fn find_model_by_id(id: &str) -> Option<&'static ModelInfo> {
    WHISPER_MODELS.iter().find(|m| m.id == id)
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

/// Resolves the on-disk location of model files from [`AppPaths`].
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Directory that contains (or will contain) GGML `.bin` files.
    pub models_dir: PathBuf,
}

impl ModelPaths {
    /// Build a [`ModelPaths`] from the application's [`AppPaths`].
    pub fn from_app_paths(app_paths: &AppPaths) -> Self {
        Self {
            models_dir: app_paths.models_dir.clone(),
        }
    }

    /// Construct directly from a models directory path (useful in tests).
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Full path to the GGML file for the given model.
    pub fn model_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(model.file_name)
    }

    /// Returns `true` if the model file exists on disk.
    pub fn is_available(&self, model: &ModelInfo) -> bool {
        self.model_path(model).exists()
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Byte-level progress of a model download, forwarded to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// File being fetched.
    pub file: String,
    /// Completion percentage, `0.0..=100.0` (0 when the size is unknown).
    pub percent: f32,
    /// Bytes received so far.
    pub loaded: u64,
    /// Total bytes, when the server reported a content length.
    pub total: Option<u64>,
}

/// Errors from [`ensure_model`].
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown model id: {0}")]
    UnknownModel(String),

    #[error("model download failed: {0}")]
    Download(String),

    #[error("model download failed: HTTP {0}")]
    Status(u16),

    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Download(e.to_string())
    }
}

const DOWNLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Make sure the GGML file for `model` exists under `paths`, downloading it
/// when missing.
///
/// Blocking — intended to run on the inference worker thread, never on the
/// UI thread.  `on_progress` is invoked once per received chunk.  The file
/// is streamed to `<name>.part` and renamed on completion, so an aborted
/// download never leaves a truncated model behind.
pub fn ensure_model(
    paths: &ModelPaths,
    model: &ModelInfo,
    mut on_progress: impl FnMut(DownloadProgress),
) -> Result<PathBuf, ModelError> {
    let target = paths.model_path(model);
    if target.exists() {
        return Ok(target);
    }

    fs::create_dir_all(&paths.models_dir)?;

    log::info!(
        "model: downloading {} ({} MB) from {}",
        model.file_name,
        model.file_size_mb,
        model.source_url
    );

    let mut response = reqwest::blocking::get(model.source_url)?;
    if !response.status().is_success() {
        return Err(ModelError::Status(response.status().as_u16()));
    }

    let total = response.content_length();
    let part_path = target.with_extension("bin.part");
    let mut file = fs::File::create(&part_path)?;

    let mut loaded: u64 = 0;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    loop {
        let n = response.read(&mut buf).map_err(ModelError::Io)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        loaded += n as u64;

        let percent = total
            .map(|t| (loaded as f32 / t as f32) * 100.0)
            .unwrap_or(0.0);
        on_progress(DownloadProgress {
            file: model.file_name.to_string(),
            percent,
            loaded,
            total,
        });
    }

    file.flush()?;
    drop(file);
    fs::rename(&part_path, &target)?;

    log::info!("model: {} downloaded ({loaded} bytes)", model.file_name);
    Ok(target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
