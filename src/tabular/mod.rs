//! Delimited text interchange
//!
//! - `encoding`: BOM and UTF-8 sniffing, streaming decode
//! - `reader`: delimiter detection and lazy record parsing
//! - `writer`: RFC 4180 output with a formula-injection guard
//! - `columns`: header spellings to canonical fields

pub mod columns;
pub mod encoding;
pub mod reader;
pub mod writer;

pub use columns::{ColumnMapper, ColumnMapping};
pub use encoding::TextEncoding;
pub use reader::{parse, CsvRow, CsvRows, ParseResult, ReaderOptions, RowError};
pub use writer::{Cell, CsvWriter};
