//! MineraLog backup and interchange
//!
//! This library moves a MineraLog mineral collection in and out of the
//! application: password-protected ZIP backups with photo media, and CSV
//! spreadsheets in the encodings and delimiters that spreadsheet tools
//! actually produce.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `logging`: Log output for the command line
//! - `crypto`: Argon2id key derivation and AES-256-GCM envelopes
//! - `models`: Specimens, components and reference minerals
//! - `storage`: The collection store the backups read from and write to
//! - `tabular`: CSV reading, writing and header mapping
//! - `archive`: Hardened ZIP reading and writing
//! - `backup`: Export and import orchestration
//! - `cli`: Command handlers for the `mineralog` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use mineralog::config::{MineralogPaths, Settings};
//!
//! let paths = MineralogPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;
pub mod tabular;

pub use error::{MineralogError, MineralogResult};
