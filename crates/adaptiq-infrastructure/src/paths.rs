//! Unified path management for AdaptIQ files.
//!
//! Paths are resolved via `AppPaths` from the version-migrate crate, so they
//! follow platform conventions (XDG on Linux/macOS, the usual on Windows).

use std::path::PathBuf;
use version_migrate::AppPaths;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for AdaptIQ.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/adaptiq/           # Config directory
/// └── config.toml              # Application configuration
///
/// ~/.local/share/adaptiq/      # Data directory (or `storage.data_dir`)
/// ├── cache.json               # Local session cache
/// └── documents/               # Directory-backed document store
/// ```
#[derive(Debug, Clone, Default)]
pub struct AdaptiqPaths {
    data_base: Option<PathBuf>,
}

impl AdaptiqPaths {
    /// Paths with platform defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths whose data directory is `data_dir` instead of the platform one.
    pub fn with_data_dir(data_dir: Option<PathBuf>) -> Self {
        Self { data_base: data_dir }
    }

    fn app_paths(&self) -> AppPaths {
        AppPaths::new("adaptiq")
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        self.app_paths()
            .config_dir()
            .map_err(|_| PathError::HomeDirNotFound)
    }

    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(base) = &self.data_base {
            return Ok(base.clone());
        }
        self.app_paths()
            .data_dir()
            .map_err(|_| PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the path of the local session cache.
    pub fn cache_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("cache.json"))
    }

    /// Returns the root of the directory-backed document store.
    pub fn documents_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("documents"))
    }
}
