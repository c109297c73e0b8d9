//! Unified path management for cadence files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/cadence/           # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/cadence/      # Data directory (overridable via storage.data_dir)
//! └── sessions/                # One TOML file per session
//!     └── <session-id>.toml
//! ```

use std::path::PathBuf;

use cadence_core::error::CadenceError;

const APP_DIR: &str = "cadence";

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";

pub struct CadencePaths;

impl CadencePaths {
    /// Returns the cadence configuration directory (e.g. `~/.config/cadence/`).
    pub fn config_dir() -> Result<PathBuf, CadenceError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CadenceError::config("Cannot determine the config directory"))
    }

    /// Returns the cadence data directory (e.g. `~/.local/share/cadence/`).
    pub fn data_dir() -> Result<PathBuf, CadenceError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CadenceError::config("Cannot determine the data directory"))
    }

    /// Path of the config file: `$CADENCE_CONFIG` if set, else
    /// `<config_dir>/config.toml`.
    pub fn config_file() -> Result<PathBuf, CadenceError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(Self::config_dir()?.join("config.toml")),
        }
    }

    /// Sessions directory below `data_dir`.
    pub fn sessions_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf, CadenceError> {
        let base = match data_dir {
            Some(dir) => dir.clone(),
            None => Self::data_dir()?,
        };
        Ok(base.join("sessions"))
    }
}
