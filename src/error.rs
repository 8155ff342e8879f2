//! Custom error types for MineraLog backup and interchange
//!
//! Row-level problems (`Validation`, `Parse`) are collected into import
//! outcomes; everything else aborts the operation that raised it.

use thiserror::Error;

/// The main error type for backup and interchange operations
#[derive(Error, Debug)]
pub enum MineralogError {
    /// A field value violates a domain constraint
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed tabular syntax on a given line
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Required column mapping could not be resolved
    #[error("Column mapping error: {0}")]
    ColumnMapping(String),

    /// An archive guard tripped (oversized file, ratio bomb, size ceiling)
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// Manifest declares an unsupported schema version
    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaVersion { found: String, expected: String },

    /// Wrong password or corrupted envelope
    #[error("Decryption failed: wrong password or corrupted data")]
    Decryption(#[source] Box<MineralogError>),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// AEAD tag did not verify
    #[error("Authentication failed")]
    AuthenticationFailure,

    /// Missing or malformed archive manifest
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Container-level read/write failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },
}

impl MineralogError {
    /// Create a "not found" error for minerals
    pub fn mineral_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Mineral",
            identifier: identifier.into(),
        }
    }

    /// Wrap a KDF or cipher failure as a decryption failure
    pub fn decryption(inner: MineralogError) -> Self {
        Self::Decryption(Box::new(inner))
    }

    /// Create a parse error for a line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error aborts a whole import rather than a single row
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Parse { .. })
    }
}

impl From<std::io::Error> for MineralogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MineralogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<zip::result::ZipError> for MineralogError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io.to_string()),
            other => Self::Archive(other.to_string()),
        }
    }
}

impl From<csv::Error> for MineralogError {
    fn from(err: csv::Error) -> Self {
        Self::Export(err.to_string())
    }
}

/// Result type alias for MineraLog operations
pub type MineralogResult<T> = Result<T, MineralogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MineralogError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = MineralogError::mineral_not_found("Quartz");
        assert_eq!(err.to_string(), "Mineral not found: Quartz");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_schema_version_error() {
        let err = MineralogError::SchemaVersion {
            found: "2.0.0".into(),
            expected: "1.0.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported schema version 2.0.0 (expected 1.0.0)"
        );
    }

    #[test]
    fn test_decryption_wraps_source() {
        use std::error::Error;

        let err = MineralogError::decryption(MineralogError::AuthenticationFailure);
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Authentication failed"));
    }

    #[test]
    fn test_row_errors_are_not_fatal() {
        assert!(!MineralogError::Validation("bad".into()).is_fatal());
        assert!(!MineralogError::parse(3, "unclosed quoted field").is_fatal());
        assert!(MineralogError::SecurityViolation("bomb".into()).is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MineralogError = io_err.into();
        assert!(matches!(err, MineralogError::Io(_)));
    }
}
