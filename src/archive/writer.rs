//! Archive writing

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::path::sanitize_entry_path;
use crate::backup::worker::CancelFlag;
use crate::error::{MineralogError, MineralogResult};

/// Streams entries into a Deflate-compressed ZIP
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: FileOptions<'static, ()>,
    entries: usize,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        }
    }

    fn start(&mut self, path: &str) -> MineralogResult<()> {
        let path = sanitize_entry_path(path)
            .ok_or_else(|| MineralogError::InvalidInput(format!("Invalid entry name: {}", path)))?;
        self.zip.start_file(path, self.options)?;
        self.entries += 1;
        Ok(())
    }

    /// Add an in-memory entry
    pub fn add_bytes(&mut self, path: &str, data: &[u8]) -> MineralogResult<()> {
        self.start(path)?;
        self.zip.write_all(data)?;
        Ok(())
    }

    /// Stream a file from disk into a new entry
    pub fn add_file(&mut self, path: &str, source: &Path, cancel: &CancelFlag) -> MineralogResult<u64> {
        let mut reader = File::open(source).map_err(|e| {
            MineralogError::Io(format!("Failed to read {}: {}", source.display(), e))
        })?;
        self.start(path)?;

        let mut written = 0u64;
        let mut buffer = [0u8; 8192];
        loop {
            cancel.check()?;
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            self.zip.write_all(&buffer[..read])?;
            written += read as u64;
        }
        Ok(written)
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write the central directory and return the inner writer
    pub fn finish(self) -> MineralogResult<W> {
        Ok(self.zip.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_entries_written_in_order() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        writer.add_bytes("manifest.json", b"{}").unwrap();
        writer.add_bytes("minerals.json", b"[]").unwrap();
        assert_eq!(writer.entry_count(), 2);
        let cursor = writer.finish().unwrap();

        let mut archive = ZipArchive::new(cursor).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "manifest.json");
        assert_eq!(archive.by_index(1).unwrap().name(), "minerals.json");
        assert_eq!(
            archive.by_index(1).unwrap().compression(),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_add_file_streams_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jpg");
        let content = vec![42u8; 20_000];
        std::fs::write(&source, &content).unwrap();

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        let written = writer
            .add_file("photos/photo.jpg", &source, &CancelFlag::new())
            .unwrap();
        assert_eq!(written, 20_000);

        let mut archive = ZipArchive::new(writer.finish().unwrap()).unwrap();
        let mut entry = archive.by_name("photos/photo.jpg").unwrap();
        let mut read_back = Vec::new();
        entry.read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, content);
    }

    #[test]
    fn test_unsafe_names_refused() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(
            writer.add_bytes("../x", b""),
            Err(MineralogError::InvalidInput(_))
        ));
    }
}
