//! Storage layer for MineraLog
//!
//! Provides JSON file storage with atomic writes and snapshot transactions.

pub mod collection;
pub mod file_io;

pub use collection::{with_transaction, CollectionStore, JsonCollectionStore};
pub use file_io::{read_json, write_json_atomic};
