//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup service.

pub mod archive;
pub mod csv;
pub mod output;
pub mod password;

pub use self::archive::{
    handle_export_zip, handle_import_zip, handle_inspect, ExportZipArgs, ImportZipArgs, InspectArgs,
};
pub use self::csv::{
    handle_export_csv, handle_import_csv, handle_preview_csv, ExportCsvArgs, ImportCsvArgs,
    PreviewCsvArgs,
};
