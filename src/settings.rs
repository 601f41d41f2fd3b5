//! Code for loading program settings.
use crate::input::read_toml;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Program settings from an optional `settings.toml` in the model directory.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    pub log_level: Option<String>,
    /// Whether to overwrite the output directory by default
    #[serde(default)]
    pub overwrite: bool,
}

impl Settings {
    /// Read the settings file from the model directory.
    ///
    /// If the file is not present, default values are used.
    pub fn from_path(model_dir: &Path) -> Result<Settings> {
        let file_path = model_dir.join(SETTINGS_FILE_NAME);
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(&file_path)
    }
}
