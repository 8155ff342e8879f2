//! Configuration module for MineraLog
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - User settings persistence

pub mod paths;
pub mod settings;

pub use paths::MineralogPaths;
pub use settings::{CsvSettings, Settings};
