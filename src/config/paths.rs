//! Platform-specific configuration paths.

use crate::constants::{APP_NAME, CONFIG_PATH_ENV};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/taxalens/`
/// - macOS: `~/Library/Application Support/taxalens/`
/// - Windows: `%APPDATA%\taxalens\`
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the config file.
///
/// `TAXALENS_CONFIG` overrides the platform location.
pub fn config_file_path() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(config_dir()?.join("config.toml")),
    }
}
