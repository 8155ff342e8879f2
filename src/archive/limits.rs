//! Size and ratio guards for untrusted archives

use serde::{Deserialize, Serialize};

use crate::error::{MineralogError, MineralogResult};

const MIB: u64 = 1024 * 1024;

/// Guards applied before and during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveLimits {
    /// Largest archive file accepted at all
    pub max_archive_bytes: u64,
    /// Largest declared uncompressed size for one entry; larger entries are skipped
    pub max_entry_bytes: u64,
    /// Ceiling on the sum of declared uncompressed sizes
    pub max_total_bytes: u64,
    /// Highest tolerated decompressed:compressed ratio, cumulative
    pub max_ratio: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: 100 * MIB,
            max_entry_bytes: 50 * MIB,
            max_total_bytes: 500 * MIB,
            max_ratio: 100,
        }
    }
}

impl ArchiveLimits {
    /// Reject an archive whose file size is over the ceiling
    pub fn check_archive_size(&self, len: u64) -> MineralogResult<()> {
        if len > self.max_archive_bytes {
            return Err(MineralogError::SecurityViolation(format!(
                "Archive is {} MB, maximum is {} MB",
                len / MIB,
                self.max_archive_bytes / MIB
            )));
        }
        Ok(())
    }

    pub fn entry_too_large(&self, declared: u64) -> bool {
        declared > self.max_entry_bytes
    }

    pub fn budget(&self) -> DecompressionBudget {
        DecompressionBudget {
            limits: *self,
            compressed: 0,
            uncompressed: 0,
        }
    }
}

/// Running totals over the entries selected for extraction
#[derive(Debug, Clone)]
pub struct DecompressionBudget {
    limits: ArchiveLimits,
    compressed: u64,
    uncompressed: u64,
}

impl DecompressionBudget {
    /// Account for one entry, failing once either cumulative guard trips
    pub fn charge(&mut self, compressed: u64, uncompressed: u64) -> MineralogResult<()> {
        if uncompressed == 0 {
            return Ok(());
        }

        // Stored entries may report a zero compressed size
        let compressed = if compressed == 0 { uncompressed } else { compressed };
        self.compressed = self.compressed.saturating_add(compressed);
        self.uncompressed = self.uncompressed.saturating_add(uncompressed);

        if self.uncompressed > self.compressed.saturating_mul(self.limits.max_ratio) {
            return Err(MineralogError::SecurityViolation(format!(
                "Potential ZIP bomb: decompression ratio {}:1 exceeds {}:1",
                self.uncompressed / self.compressed,
                self.limits.max_ratio
            )));
        }

        if self.uncompressed > self.limits.max_total_bytes {
            return Err(MineralogError::SecurityViolation(format!(
                "Decompressed size {} MB exceeds maximum {} MB",
                self.uncompressed / MIB,
                self.limits.max_total_bytes / MIB
            )));
        }

        Ok(())
    }

    pub fn uncompressed(&self) -> u64 {
        self.uncompressed
    }
}
