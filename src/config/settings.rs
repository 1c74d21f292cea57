//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// TranscriptionRoute
// ---------------------------------------------------------------------------

/// Selects which transcription path handles a recorded clip.
///
/// | Variant       | Path                                     | Network |
/// |---------------|------------------------------------------|---------|
/// | LocalModel    | whisper on the background worker thread  | model download only |
/// | RemoteBackend | multipart upload to the backend endpoint | every clip |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptionRoute {
    /// In-process whisper inference — private, works offline once the model
    /// file is present.
    LocalModel,
    /// Backend transcription service — no local model, needs connectivity.
    RemoteBackend,
}

impl Default for TranscriptionRoute {
    fn default() -> Self {
        Self::LocalModel
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Settings for the chat backend client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the assistant backend (e.g. `http://localhost:8080`).
    ///
    /// The message endpoint is `{base_url}/api/v2/chat/message`.
    pub base_url: String,
    /// Maximum seconds to wait for a chat response before timing out.
    pub timeout_secs: u64,
    /// Render the intent / confidence / sentiment line under bot messages.
    pub show_debug_info: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_secs: 15,
            show_debug_info: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscribeConfig
// ---------------------------------------------------------------------------

/// Settings for the two voice transcription paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeConfig {
    /// Which path a recorded clip is sent down.
    pub route: TranscriptionRoute,
    /// GGML model id for the local path (e.g. `"whisper-base-en"`).
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for
    /// whisper's built-in language detection.
    pub language: String,
    /// Base URL of the backend transcription service (remote path).
    ///
    /// The upload endpoint is `{remote_base_url}/api/transcribe-audio`.
    pub remote_base_url: String,
    /// Maximum seconds to wait for the remote service before timing out.
    pub remote_timeout_secs: u64,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            route: TranscriptionRoute::default(),
            model: "whisper-base-en".into(),
            language: "en".into(),
            remote_base_url: "http://localhost:8080".into(),
            remote_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz fed to the STT engine (must be 16 000).
    pub sample_rate: u32,
    /// Minimum recording length in seconds before transcription is attempted.
    pub min_recording_secs: f32,
    /// Maximum recording length in seconds; longer clips are truncated to
    /// the leading samples when the recording stops.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            min_recording_secs: 0.5,
            max_recording_secs: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui widget appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels.  `None` means
    /// let the OS / window manager pick a position on first launch.
    pub window_position: Option<(f32, f32)>,
    /// Keep the chat window floating above all other windows.
    pub always_on_top: bool,
    /// Automatically send a transcription result as a chat message instead
    /// of leaving it in the input box for review.
    pub auto_send_transcripts: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            always_on_top: false,
            auto_send_transcripts: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use auto_assist::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat backend settings.
    pub chat: ChatConfig,
    /// Voice transcription settings.
    pub transcribe: TranscribeConfig,
    /// Microphone capture settings.
    pub audio: AudioConfig,
    /// UI / window settings.
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            transcribe: TranscribeConfig::default(),
            audio: AudioConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
