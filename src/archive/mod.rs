//! ZIP container for backups
//!
//! Layout: `manifest.json`, `minerals.json`, optional
//! `reference_minerals.csv`, then media under `photos/`.

pub mod limits;
pub mod path;
pub mod reader;
pub mod writer;

pub use limits::ArchiveLimits;
pub use reader::{ArchiveContents, ArchiveEntry, ArchiveReader, OpenedArchive, StagedMedia};
pub use writer::ArchiveWriter;
