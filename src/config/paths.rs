//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\auto-assist\
//!   macOS:   ~/Library/Application Support/auto-assist/
//!   Linux:   ~/.config/auto-assist/
//!
//! Data dir (downloaded models):
//!   Windows: %LOCALAPPDATA%\auto-assist\
//!   macOS:   ~/Library/Application Support/auto-assist/
//!   Linux:   ~/.local/share/auto-assist/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "auto-assist";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
