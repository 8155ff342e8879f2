//! Core data models for MineraLog
//!
//! Specimens with their embedded records, and the reference mineral library.

pub mod ids;
pub mod mineral;
pub mod reference;

pub use ids::{ComponentId, MineralId, PhotoId, ProvenanceId, ReferenceMineralId, StorageId};
pub use mineral::{
    normalize_name, ComponentRole, Mineral, MineralComponent, MineralType, Photo, Provenance,
    StorageLocation,
};
pub use reference::ReferenceMineral;
