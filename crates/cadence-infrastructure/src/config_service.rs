//! Configuration loading.
//!
//! Reads [`CadenceConfig`] from `config.toml`. A missing or empty file yields
//! the defaults; a file that fails to parse is an error so that typos are not
//! silently ignored.

use std::path::{Path, PathBuf};

use cadence_core::config::CadenceConfig;
use cadence_core::error::{CadenceError, Result};

use crate::paths::CadencePaths;
use crate::storage::AtomicTomlFile;

pub struct ConfigService {
    file: AtomicTomlFile<CadenceConfig>,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Service for the default location (`$CADENCE_CONFIG` or the platform
    /// config dir).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(CadencePaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn load(&self) -> Result<CadenceConfig> {
        let config = self.file.load().map_err(|e| {
            CadenceError::config(format!("Failed to load {:?}: {}", self.file.path(), e))
        })?;
        match config {
            Some(config) => {
                tracing::debug!("[ConfigService] Loaded config from {:?}", self.file.path());
                Ok(config)
            }
            None => {
                tracing::debug!(
                    "[ConfigService] No config at {:?}, using defaults",
                    self.file.path()
                );
                Ok(CadenceConfig::default())
            }
        }
    }

    pub fn save(&self, config: &CadenceConfig) -> Result<()> {
        self.file.save(config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        assert_eq!(service.load().unwrap(), CadenceConfig::default());
    }

    #[test]
    fn test_saved_config_is_loaded_back() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));

        let mut config = CadenceConfig::default();
        config.orchestration.max_step_attempts = 9;
        config.orchestration.test_command = Some("make test".to_string());
        config.storage.data_dir = Some(temp_dir.path().join("data"));
        service.save(&config).unwrap();

        assert_eq!(service.load().unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[orchestration]\nmax_step_attempts = \"many\"\n").unwrap();

        let err = ConfigService::new(path).load().unwrap_err();
        assert!(matches!(err, CadenceError::Config(_)));
    }
}
