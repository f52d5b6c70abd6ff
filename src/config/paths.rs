//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voice-report\
//!   macOS:   ~/Library/Application Support/voice-report/
//!   Linux:   ~/.config/voice-report/
//!
//! Data dir (finished reports):
//!   Windows: %LOCALAPPDATA%\voice-report\
//!   macOS:   ~/Library/Application Support/voice-report/
//!   Linux:   ~/.local/share/voice-report/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory where finished reports are written.
    pub reports_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-report";

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
        let reports_dir = data_dir.join("reports");

        Self {
            config_dir,
            settings_file,
            reports_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
