//! Hardened archive reading
//!
//! Opening an archive checks its file size, then walks the central directory
//! once: unsafe names are refused, oversized entries skipped, and the
//! cumulative ratio and size guards evaluated over everything that would be
//! extracted. Only then is any entry decompressed, and every read is capped
//! at the entry's declared size.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::limits::ArchiveLimits;
use super::path::{classify, sanitize_entry_path, EntryKind};
use crate::backup::worker::CancelFlag;
use crate::error::{MineralogError, MineralogResult};

/// Central directory facts about one selected entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Sanitized path
    pub path: String,
    pub compressed_size: u64,
    /// Uncompressed size claimed by the header; never trusted unchecked
    pub declared_size: u64,
}

/// A media file extracted into the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    /// Name relative to the media directory
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Payload of an archive, minus the manifest
#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub records: Option<Vec<u8>>,
    pub reference_csv: Option<Vec<u8>>,
    pub media: Vec<StagedMedia>,
    /// Entries refused while planning or extracting
    pub errors: Vec<String>,
}

struct PlannedEntry {
    index: usize,
    kind: EntryKind,
    entry: ArchiveEntry,
}

/// Opens archives under a set of limits
#[derive(Debug, Clone, Default)]
pub struct ArchiveReader {
    limits: ArchiveLimits,
}

impl ArchiveReader {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ArchiveLimits {
        &self.limits
    }

    /// Pre-flight and plan an archive without decompressing anything
    pub fn open(&self, path: &Path) -> MineralogResult<OpenedArchive> {
        let len = fs::metadata(path)
            .map_err(|e| MineralogError::Io(format!("Failed to read {}: {}", path.display(), e)))?
            .len();
        self.limits.check_archive_size(len)?;

        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut errors = Vec::new();
        let planned = plan_entries(&mut archive, &self.limits, &mut errors)?;
        debug!(
            path = %path.display(),
            entries = planned.len(),
            rejected = errors.len(),
            "Planned archive extraction"
        );

        Ok(OpenedArchive {
            archive,
            planned,
            errors,
        })
    }
}

fn plan_entries(
    archive: &mut ZipArchive<File>,
    limits: &ArchiveLimits,
    errors: &mut Vec<String>,
) -> MineralogResult<Vec<PlannedEntry>> {
    let mut budget = limits.budget();
    let mut planned = Vec::new();
    let mut seen = HashSet::new();

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let Some(path) = sanitize_entry_path(&raw_name) else {
            warn!(entry = %raw_name, "Skipping unsafe archive entry");
            errors.push(format!("Skipped unsafe entry: {}", raw_name));
            continue;
        };

        let Some(kind) = classify(&path) else {
            debug!(entry = %path, "Ignoring unknown archive entry");
            continue;
        };

        let declared_size = entry.size();
        let compressed_size = entry.compressed_size();

        if limits.entry_too_large(declared_size) {
            warn!(entry = %path, size = declared_size, "Skipping oversized archive entry");
            errors.push(format!(
                "Skipped oversized entry: {} ({} bytes)",
                path, declared_size
            ));
            continue;
        }

        if !seen.insert(kind.clone()) {
            errors.push(format!("Skipped duplicate entry: {}", path));
            continue;
        }

        budget.charge(compressed_size, declared_size)?;

        planned.push(PlannedEntry {
            index,
            kind,
            entry: ArchiveEntry {
                path,
                compressed_size,
                declared_size,
            },
        });
    }

    Ok(planned)
}

/// An archive that passed planning
pub struct OpenedArchive {
    archive: ZipArchive<File>,
    planned: Vec<PlannedEntry>,
    errors: Vec<String>,
}

impl OpenedArchive {
    /// Entries selected for extraction, in archive order
    pub fn entries(&self) -> Vec<ArchiveEntry> {
        self.planned.iter().map(|p| p.entry.clone()).collect()
    }

    /// Entries refused during planning
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_manifest(&self) -> bool {
        self.planned.iter().any(|p| p.kind == EntryKind::Manifest)
    }

    /// Read `manifest.json`, if the archive has one
    pub fn read_manifest(&mut self) -> MineralogResult<Option<Vec<u8>>> {
        let Some(position) = self
            .planned
            .iter()
            .position(|p| p.kind == EntryKind::Manifest)
        else {
            return Ok(None);
        };
        let index = self.planned[position].index;
        let entry = self.planned[position].entry.clone();
        read_capped(&mut self.archive, index, &entry).map(Some)
    }

    /// Extract the payload and stage media files under `staging_dir`
    pub fn extract(mut self, staging_dir: &Path, cancel: &CancelFlag) -> MineralogResult<ArchiveContents> {
        let mut contents = ArchiveContents {
            errors: std::mem::take(&mut self.errors),
            ..ArchiveContents::default()
        };

        for planned in &self.planned {
            cancel.check()?;

            match &planned.kind {
                EntryKind::Manifest => {}
                EntryKind::Records => {
                    contents.records = Some(read_capped(&mut self.archive, planned.index, &planned.entry)?);
                }
                EntryKind::ReferenceCsv => {
                    contents.reference_csv =
                        Some(read_capped(&mut self.archive, planned.index, &planned.entry)?);
                }
                EntryKind::Media(file_name) => {
                    let target = staging_dir.join(file_name);
                    let size = copy_capped(&mut self.archive, planned.index, &planned.entry, &target)?;
                    contents.media.push(StagedMedia {
                        file_name: file_name.clone(),
                        path: target,
                        size,
                    });
                }
            }
        }

        debug!(media = contents.media.len(), "Extracted archive payload");
        Ok(contents)
    }
}

fn oversized(entry: &ArchiveEntry) -> MineralogError {
    MineralogError::SecurityViolation(format!(
        "Entry {} is larger than its declared {} bytes",
        entry.path, entry.declared_size
    ))
}

fn read_capped(
    archive: &mut ZipArchive<File>,
    index: usize,
    entry: &ArchiveEntry,
) -> MineralogResult<Vec<u8>> {
    let file = archive.by_index(index)?;
    let mut buffer = Vec::with_capacity(entry.declared_size.min(1024 * 1024) as usize);
    file.take(entry.declared_size + 1).read_to_end(&mut buffer)?;

    if buffer.len() as u64 > entry.declared_size {
        return Err(oversized(entry));
    }
    Ok(buffer)
}

fn copy_capped(
    archive: &mut ZipArchive<File>,
    index: usize,
    entry: &ArchiveEntry,
    target: &Path,
) -> MineralogResult<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = archive.by_index(index)?;
    let mut out = File::create(target)?;
    let copied = io::copy(&mut file.take(entry.declared_size + 1), &mut out)?;

    if copied > entry.declared_size {
        drop(out);
        let _ = fs::remove_file(target);
        return Err(oversized(entry));
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::writer::ArchiveWriter;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn write_raw_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_round_trip_with_writer() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("backup.zip");

        let mut writer = ArchiveWriter::new(File::create(&archive_path).unwrap());
        writer.add_bytes("manifest.json", b"{}").unwrap();
        writer.add_bytes("minerals.json", b"[]").unwrap();
        writer.add_bytes("photos/q.jpg", b"jpeg").unwrap();
        writer.finish().unwrap();

        let mut opened = ArchiveReader::default().open(&archive_path).unwrap();
        assert_eq!(opened.entries().len(), 3);
        assert_eq!(opened.read_manifest().unwrap().as_deref(), Some(&b"{}"[..]));

        let staging = TempDir::new().unwrap();
        let contents = opened.extract(staging.path(), &CancelFlag::new()).unwrap();
        assert_eq!(contents.records.as_deref(), Some(&b"[]"[..]));
        assert_eq!(contents.media.len(), 1);
        assert_eq!(fs::read(&contents.media[0].path).unwrap(), b"jpeg");
        assert!(contents.errors.is_empty());
    }

    #[test]
    fn test_traversal_entries_rejected_and_never_written() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("evil.zip");
        write_raw_zip(
            &archive_path,
            &[
                ("manifest.json", b"{}"),
                ("../escape.txt", b"owned"),
                ("photos/../../escape.jpg", b"owned"),
                ("photos/ok.jpg", b"fine"),
            ],
        );

        let staging = TempDir::new().unwrap();
        let opened = ArchiveReader::default().open(&archive_path).unwrap();
        let contents = opened.extract(staging.path(), &CancelFlag::new()).unwrap();

        assert_eq!(contents.errors.len(), 2);
        assert_eq!(contents.media.len(), 1);
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!staging.path().parent().unwrap().join("escape.jpg").exists());
    }

    #[test]
    fn test_zip_bomb_rejected_before_extraction() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("bomb.zip");
        let zeros = vec![0u8; 4 * 1024 * 1024];
        write_raw_zip(
            &archive_path,
            &[("manifest.json", b"{}"), ("photos/zeros.bin", &zeros)],
        );

        let result = ArchiveReader::default().open(&archive_path);
        assert!(matches!(result, Err(MineralogError::SecurityViolation(_))));
    }

    #[test]
    fn test_total_ceiling_enforced() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("big.zip");
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7919 % 251) as u8).collect();
        write_raw_zip(
            &archive_path,
            &[("photos/a.bin", &data), ("photos/b.bin", &data)],
        );

        let limits = ArchiveLimits {
            max_total_bytes: 6000,
            ..ArchiveLimits::default()
        };
        let result = ArchiveReader::new(limits).open(&archive_path);
        assert!(matches!(result, Err(MineralogError::SecurityViolation(_))));
    }

    #[test]
    fn test_oversized_archive_file_rejected() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("backup.zip");
        write_raw_zip(&archive_path, &[("manifest.json", b"{}")]);

        let limits = ArchiveLimits {
            max_archive_bytes: 10,
            ..ArchiveLimits::default()
        };
        let result = ArchiveReader::new(limits).open(&archive_path);
        assert!(matches!(result, Err(MineralogError::SecurityViolation(_))));
    }

    #[test]
    fn test_oversized_entry_skipped() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("backup.zip");
        let data: Vec<u8> = (0..2048u32).map(|i| (i * 31 % 253) as u8).collect();
        write_raw_zip(
            &archive_path,
            &[("minerals.json", b"[]"), ("photos/huge.bin", &data)],
        );

        let limits = ArchiveLimits {
            max_entry_bytes: 1024,
            ..ArchiveLimits::default()
        };
        let opened = ArchiveReader::new(limits).open(&archive_path).unwrap();
        assert_eq!(opened.errors().len(), 1);
        assert!(!opened.has_manifest());

        let staging = TempDir::new().unwrap();
        let contents = opened.extract(staging.path(), &CancelFlag::new()).unwrap();
        assert!(contents.media.is_empty());
        assert!(contents.records.is_some());
    }

    #[test]
    fn test_cancelled_extraction() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("backup.zip");
        write_raw_zip(&archive_path, &[("minerals.json", b"[]")]);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let staging = TempDir::new().unwrap();
        let opened = ArchiveReader::default().open(&archive_path).unwrap();
        assert!(matches!(
            opened.extract(staging.path(), &cancel),
            Err(MineralogError::Cancelled)
        ));
    }

    #[test]
    fn test_unknown_entries_ignored() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("backup.zip");
        write_raw_zip(
            &archive_path,
            &[("minerals.json", b"[]"), ("notes/readme.txt", b"hello")],
        );

        let opened = ArchiveReader::default().open(&archive_path).unwrap();
        assert_eq!(opened.entries().len(), 1);
        assert!(opened.errors().is_empty());
    }
}
