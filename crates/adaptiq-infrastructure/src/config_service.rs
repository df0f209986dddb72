//! Configuration service implementation.
//!
//! Loads the application configuration from `config.toml`
//! (`~/.config/adaptiq/config.toml` unless a path is given). A missing file
//! means defaults.

use crate::paths::AdaptiqPaths;
use crate::storage::{AtomicFile, FileFormat};
use adaptiq_core::config::HistoryConfig;
use adaptiq_core::error::{AdaptiqError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Default `tracing` filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "adaptiq=info";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub history: HistoryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Paths honoring `storage.data_dir`.
    pub fn paths(&self) -> AdaptiqPaths {
        AdaptiqPaths::with_data_dir(self.storage.data_dir.clone())
    }
}

/// Loads and caches the application configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration, filled on first access.
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Service over the default `config.toml` location.
    pub fn new() -> Result<Self> {
        let path = AdaptiqPaths::new()
            .config_file()
            .map_err(|e| AdaptiqError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// A file that cannot be parsed is a configuration error; a missing one
    /// yields defaults.
    pub fn get_config(&self) -> Result<AppConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = AtomicFile::<AppConfig>::new(self.path.clone(), FileFormat::Toml)
            .load()
            .map_err(|e| {
                AdaptiqError::config(format!("Failed to load {}: {}", self.path.display(), e))
            })?
            .unwrap_or_default();

        let mut cached = self.config.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(loaded.clone());
        Ok(loaded)
    }

    /// Writes the configuration and refreshes the cache.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        AtomicFile::<AppConfig>::new(self.path.clone(), FileFormat::Toml).save(config)?;
        let mut cached = self.config.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(config.clone());
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self.config.write().unwrap_or_else(|e| e.into_inner());
        *cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));

        let config = service.get_config().unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.history.max_local_sessions, 20);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[history]\nuser_id = \"student-7\"\n\n[storage]\ndata_dir = \"/var/lib/adaptiq\"\n",
        )
        .unwrap();

        let config = ConfigService::with_path(path).get_config().unwrap();
        assert_eq!(config.history.user_id, "student-7");
        assert_eq!(config.history.title_max_chars, 30);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/var/lib/adaptiq")));
        assert_eq!(
            config.paths().cache_file().unwrap(),
            PathBuf::from("/var/lib/adaptiq/cache.json")
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[history\n").unwrap();

        let err = ConfigService::with_path(path).get_config().unwrap_err();
        assert!(matches!(err, AdaptiqError::Config(_)));
    }

    #[test]
    fn test_save_then_reload() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));

        let mut config = AppConfig::default();
        config.logging.filter = "adaptiq=debug".to_string();
        service.save(&config).unwrap();
        service.invalidate_cache();

        assert_eq!(service.get_config().unwrap().logging.filter, "adaptiq=debug");
    }
}
