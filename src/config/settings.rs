//! User settings for MineraLog
//!
//! Manages archive safety limits, key derivation cost, CSV options and the
//! default import modes used by the command line.

use serde::{Deserialize, Serialize};

use super::paths::MineralogPaths;
use crate::archive::ArchiveLimits;
use crate::backup::{ArchiveImportMode, CsvImportMode};
use crate::crypto::KeyDerivationParams;
use crate::error::MineralogError;

/// CSV interchange settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvSettings {
    /// Rows shown by `preview-csv` when no count is given
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Longest logical record accepted before a row is rejected
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
}

fn default_preview_rows() -> usize {
    10
}

fn default_max_record_bytes() -> usize {
    1024 * 1024
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            max_record_bytes: default_max_record_bytes(),
        }
    }
}

/// User settings for MineraLog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Archive import guards
    #[serde(default)]
    pub archive_limits: ArchiveLimits,

    /// Argon2id cost for newly encrypted exports
    #[serde(default)]
    pub key_derivation: KeyDerivationParams,

    /// CSV options
    #[serde(default)]
    pub csv: CsvSettings,

    /// Mode used by `import-zip` when none is given
    #[serde(default)]
    pub default_archive_mode: ArchiveImportMode,

    /// Mode used by `import-csv` when none is given
    #[serde(default)]
    pub default_csv_mode: CsvImportMode,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            archive_limits: ArchiveLimits::default(),
            key_derivation: KeyDerivationParams::default(),
            csv: CsvSettings::default(),
            default_archive_mode: ArchiveImportMode::default(),
            default_csv_mode: CsvImportMode::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &MineralogPaths) -> Result<Self, MineralogError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                MineralogError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                MineralogError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &MineralogPaths) -> Result<(), MineralogError> {
        paths.ensure_directories()?;
        crate::storage::write_json_atomic(paths.settings_file(), self)
    }
}
