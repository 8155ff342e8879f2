//! Backup and interchange for MineraLog
//!
//! # Archive Format
//!
//! A backup is a Deflate ZIP holding:
//! - `manifest.json`: producer, schema version, export time, counts and,
//!   for encrypted backups, the Base64 salt and nonce
//! - `minerals.json`: the specimens as a JSON array, or its AES-256-GCM
//!   ciphertext under an Argon2id-derived key
//! - `reference_minerals.csv`: the reference library (optional)
//! - `photos/<file>`: photo files referenced by the specimens
//!
//! # Import Modes
//!
//! Archives import with [`ArchiveImportMode`] (merge by id, replace, or map
//! colliding ids); CSV files with [`CsvImportMode`] (merge by name, replace,
//! or skip duplicates). Every import runs in one store transaction and
//! reports an [`ImportOutcome`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mineralog::backup::{ArchiveImportMode, BackupService, CancelFlag};
//! use mineralog::config::MineralogPaths;
//! use mineralog::storage::JsonCollectionStore;
//!
//! let paths = MineralogPaths::new()?;
//! let store = Arc::new(JsonCollectionStore::open(&paths)?);
//! let service = BackupService::new(store);
//!
//! let summary = service.export_zip(&dest, None, &CancelFlag::new())?;
//! let outcome = service.import_zip(&dest, None, ArchiveImportMode::Merge, &CancelFlag::new())?;
//! ```

pub mod manifest;
pub mod mineral_csv;
pub mod modes;
pub mod reference_csv;
pub mod service;
pub mod worker;

pub use manifest::{Manifest, ManifestCounts, CURRENT_SCHEMA_VERSION, SUPPORTED_SCHEMA_VERSIONS};
pub use modes::{ArchiveImportMode, CsvImportMode, ImportOutcome};
pub use service::{ArchiveInfo, BackupService, CsvPreview, ExportSummary};
pub use worker::{BackgroundJob, CancelFlag};
