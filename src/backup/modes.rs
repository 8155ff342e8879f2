//! Import modes and their outcomes

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How an archive import treats records already in the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveImportMode {
    /// Match by id, update or insert
    #[default]
    Merge,
    /// Clear the collection first, in the same transaction
    Replace,
    /// Give colliding records fresh ids
    MapIds,
}

impl fmt::Display for ArchiveImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Replace => write!(f, "replace"),
            Self::MapIds => write!(f, "map-ids"),
        }
    }
}

/// How a CSV import treats rows whose name is already in the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CsvImportMode {
    /// Update in place; empty cells keep existing values
    #[default]
    Merge,
    /// Clear the collection first
    Replace,
    /// Leave existing specimens untouched
    SkipDuplicates,
}

impl fmt::Display for CsvImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Replace => write!(f, "replace"),
            Self::SkipDuplicates => write!(f, "skip-duplicates"),
        }
    }
}

/// Result of an import
///
/// Row and record problems land in `errors` and count towards `skipped`;
/// the import itself still succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Old id → new id, for records re-keyed by [`ArchiveImportMode::MapIds`]
    pub id_remaps: BTreeMap<String, String>,
}

impl ImportOutcome {
    pub(crate) fn skip(&mut self, message: String) {
        self.skipped += 1;
        self.errors.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(ArchiveImportMode::MapIds.to_string(), "map-ids");
        assert_eq!(
            serde_json::to_string(&CsvImportMode::SkipDuplicates).unwrap(),
            "\"skip-duplicates\""
        );
        assert_eq!(
            ArchiveImportMode::from_str("replace", true).unwrap(),
            ArchiveImportMode::Replace
        );
    }

    #[test]
    fn test_skip_counts() {
        let mut outcome = ImportOutcome::default();
        outcome.skip("Row 2: Name is required".into());
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.has_errors());
    }
}
