//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/watts-plugin-tester/`
//! - macOS: `~/Library/Application Support/watts-plugin-tester/`
//! - Windows: `%APPDATA%\watts-plugin-tester\`

use std::path::PathBuf;

/// Name of the application directory
const APP_NAME: &str = "watts-plugin-tester";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
