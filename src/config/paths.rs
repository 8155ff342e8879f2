//! Path management for MineraLog
//!
//! Provides XDG-compliant path resolution for configuration, collection data,
//! media files and exports.
//!
//! ## Path Resolution Order
//!
//! 1. `MINERALOG_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/mineralog` or `~/.config/mineralog`
//! 3. Windows: `%APPDATA%\mineralog`

use std::path::PathBuf;

use crate::error::MineralogError;

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "MINERALOG_DATA_DIR";

/// Manages all paths used by MineraLog
#[derive(Debug, Clone)]
pub struct MineralogPaths {
    /// Base directory for all MineraLog data
    base_dir: PathBuf,
}

impl MineralogPaths {
    /// Create a new MineralogPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, MineralogError> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create MineralogPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/mineralog/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/mineralog/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the media directory holding photo files
    pub fn media_dir(&self) -> PathBuf {
        self.base_dir.join("media")
    }

    /// Get the default export directory
    pub fn export_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to minerals.json
    pub fn minerals_file(&self) -> PathBuf {
        self.data_dir().join("minerals.json")
    }

    /// Get the path to reference_minerals.json
    pub fn reference_minerals_file(&self) -> PathBuf {
        self.data_dir().join("reference_minerals.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), MineralogError> {
        for (label, dir) in [
            ("base", self.base_dir.clone()),
            ("data", self.data_dir()),
            ("media", self.media_dir()),
            ("export", self.export_dir()),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                MineralogError::Io(format!("Failed to create {} directory: {}", label, e))
            })?;
        }

        Ok(())
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, MineralogError> {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.is_empty() {
            return Ok(PathBuf::from(config_home).join("mineralog"));
        }
    }

    let home = std::env::var("HOME")
        .map_err(|_| MineralogError::Config("Could not determine HOME directory".into()))?;
    Ok(PathBuf::from(home).join(".config").join("mineralog"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, MineralogError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| MineralogError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("mineralog"))
}
