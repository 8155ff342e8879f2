//! Backup and interchange orchestration
//!
//! `BackupService` turns the collection into ZIP archives and CSV files and
//! back. Every import validates the container, manifest and password before
//! touching the store, then applies its records in a single transaction.
//! Media files are staged next to the media directory and only moved into
//! place once that transaction has committed.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::manifest::Manifest;
use super::mineral_csv::{write_minerals, MineralRowMapper};
use super::modes::{ArchiveImportMode, CsvImportMode, ImportOutcome};
use super::reference_csv::{read_reference_minerals, write_reference_minerals};
use super::worker::CancelFlag;
use crate::archive::path::{
    media_entry_path, sanitize_entry_path, MANIFEST_ENTRY, RECORDS_ENTRY, REFERENCE_ENTRY,
};
use crate::archive::{ArchiveEntry, ArchiveLimits, ArchiveReader, ArchiveWriter, StagedMedia};
use crate::config::{CsvSettings, Settings};
use crate::crypto::{EncryptionMetadata, PasswordEnvelopeCodec, SecureBytes, SecureString};
use crate::error::{MineralogError, MineralogResult};
use crate::models::{normalize_name, Mineral, MineralId, ReferenceMineral, ReferenceMineralId};
use crate::storage::file_io::{persist_temp_file, sibling_temp_file};
use crate::storage::{with_transaction, CollectionStore};
use crate::tabular::columns::REQUIRED_FIELD;
use crate::tabular::{ColumnMapper, CsvRows, ParseResult, ReaderOptions, TextEncoding};

/// What an archive export wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub records: usize,
    pub reference_records: usize,
    pub media: usize,
    pub encrypted: bool,
    /// Photo files referenced by a specimen but absent from the media directory
    pub missing_media: Vec<String>,
}

/// Manifest and entry listing of an archive, read without extracting it
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub manifest: Manifest,
    pub entries: Vec<ArchiveEntry>,
    /// Entries the importer would refuse
    pub rejected: Vec<String>,
}

/// First rows of a CSV file and how its headers would map
#[derive(Debug, Clone)]
pub struct CsvPreview {
    pub headers: Vec<String>,
    /// Cells in header order
    pub rows: Vec<Vec<String>>,
    pub encoding: TextEncoding,
    pub delimiter: char,
    /// (header, canonical field) pairs
    pub mapping: Vec<(String, &'static str)>,
    /// Headers with no field, and the closest field if one is near
    pub unmapped: Vec<(String, Option<&'static str>)>,
    pub errors: Vec<String>,
    /// Whether some column maps to `name`
    pub has_required: bool,
}

/// Exports and imports the collection held by a [`CollectionStore`]
pub struct BackupService<S: CollectionStore> {
    store: Arc<S>,
    codec: PasswordEnvelopeCodec,
    reader: ArchiveReader,
    mapper: ColumnMapper,
    csv: CsvSettings,
}

impl<S: CollectionStore> BackupService<S> {
    /// Service with default limits and key derivation cost
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            codec: PasswordEnvelopeCodec::default(),
            reader: ArchiveReader::default(),
            mapper: ColumnMapper::new(),
            csv: CsvSettings::default(),
        }
    }

    /// Service configured from user settings
    pub fn with_settings(store: Arc<S>, settings: &Settings) -> Self {
        Self {
            store,
            codec: PasswordEnvelopeCodec::new(settings.key_derivation),
            reader: ArchiveReader::new(settings.archive_limits),
            mapper: ColumnMapper::new(),
            csv: settings.csv.clone(),
        }
    }

    pub fn with_codec(mut self, codec: PasswordEnvelopeCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_limits(mut self, limits: ArchiveLimits) -> Self {
        self.reader = ArchiveReader::new(limits);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write the whole collection to a ZIP archive at `dest`
    ///
    /// With a password the records entry is sealed and the manifest carries
    /// the salt, nonce and KDF cost. Nothing is left at `dest` on failure.
    pub fn export_zip(
        &self,
        dest: &Path,
        password: Option<&SecureString>,
        cancel: &CancelFlag,
    ) -> MineralogResult<ExportSummary> {
        info!(path = %dest.display(), encrypted = password.is_some(), "Exporting backup archive");

        let minerals = self.store.all_minerals()?;
        if minerals.is_empty() {
            return Err(MineralogError::InvalidInput("No minerals to export".into()));
        }
        let references = self.store.all_reference_minerals()?;

        let records = serde_json::to_vec(&minerals)?;
        let (payload, encryption) = match password {
            Some(password) => {
                let envelope = self.codec.seal(&records, password)?;
                let metadata = EncryptionMetadata::from_envelope(&envelope, self.codec.params());
                (envelope.ciphertext, Some(metadata))
            }
            None => (records, None),
        };

        let (media, missing_media) = self.collect_media(&minerals);
        let manifest = Manifest::new(minerals.len(), media.len(), encryption);

        let temp = sibling_temp_file(dest)?;
        {
            let mut writer = ArchiveWriter::new(temp.as_file());
            writer.add_bytes(MANIFEST_ENTRY, &manifest.to_vec()?)?;
            writer.add_bytes(RECORDS_ENTRY, &payload)?;

            if !references.is_empty() {
                cancel.check()?;
                let csv = write_reference_minerals(Vec::new(), &references, cancel)?;
                writer.add_bytes(REFERENCE_ENTRY, &csv)?;
            }

            for (file_name, source) in &media {
                cancel.check()?;
                writer.add_file(&media_entry_path(file_name), source, cancel)?;
            }
            writer.finish()?;
        }
        persist_temp_file(temp, dest)?;

        let summary = ExportSummary {
            path: dest.to_path_buf(),
            records: minerals.len(),
            reference_records: references.len(),
            media: media.len(),
            encrypted: manifest.encrypted,
            missing_media,
        };
        info!(
            records = summary.records,
            media = summary.media,
            "Backup archive written"
        );
        Ok(summary)
    }

    /// Photo files to export, and the names that could not be found
    fn collect_media(&self, minerals: &[Mineral]) -> (Vec<(String, PathBuf)>, Vec<String>) {
        let media_dir = self.store.media_dir();
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut missing = Vec::new();

        for photo in minerals.iter().flat_map(|m| &m.photos) {
            if photo.file_name.is_empty() || !seen.insert(photo.file_name.as_str()) {
                continue;
            }
            let Some(name) = sanitize_entry_path(&photo.file_name) else {
                warn!(file = %photo.file_name, "Skipping photo with unsafe file name");
                missing.push(photo.file_name.clone());
                continue;
            };
            let source = media_dir.join(&name);
            if source.is_file() {
                found.push((name, source));
            } else {
                debug!(file = %source.display(), "Photo file not found");
                missing.push(photo.file_name.clone());
            }
        }

        (found, missing)
    }

    /// Describe an archive without extracting it
    pub fn inspect_archive(&self, src: &Path) -> MineralogResult<ArchiveInfo> {
        let mut opened = self.reader.open(src)?;
        let manifest = read_manifest(opened.read_manifest()?)?;
        Ok(ArchiveInfo {
            manifest,
            entries: opened.entries(),
            rejected: opened.errors().to_vec(),
        })
    }

    /// Import a ZIP archive
    ///
    /// Size guards, manifest, schema version and decryption are all checked
    /// before the store is touched. Unreadable records are skipped and
    /// reported; anything else aborts and rolls back.
    pub fn import_zip(
        &self,
        src: &Path,
        password: Option<&SecureString>,
        mode: ArchiveImportMode,
        cancel: &CancelFlag,
    ) -> MineralogResult<ImportOutcome> {
        info!(path = %src.display(), %mode, "Importing backup archive");

        let mut opened = self.reader.open(src)?;
        let manifest = read_manifest(opened.read_manifest()?)?;
        let encryption = manifest.encryption_metadata()?.cloned();
        if encryption.is_some() && password.is_none() {
            return Err(MineralogError::InvalidInput(
                "This backup is encrypted. Please provide a password".into(),
            ));
        }

        let staging = self.staging_dir()?;
        let contents = opened.extract(staging.path(), cancel)?;

        let mut outcome = ImportOutcome {
            errors: contents.errors,
            ..ImportOutcome::default()
        };

        let records = contents
            .records
            .ok_or_else(|| MineralogError::Manifest(format!("Backup is missing {}", RECORDS_ENTRY)))?;
        let plaintext = match (&encryption, password) {
            (Some(metadata), Some(password)) => {
                let envelope = metadata.to_envelope(records)?;
                PasswordEnvelopeCodec::new(metadata.kdf_params()).open(&envelope, password)?
            }
            _ => SecureBytes::from(records),
        };

        let minerals = decode_records(&plaintext, &mut outcome)?;
        drop(plaintext);

        if manifest.counts.records != minerals.len() + outcome.skipped {
            outcome.warnings.push(format!(
                "Manifest lists {} records but the archive holds {}",
                manifest.counts.records,
                minerals.len() + outcome.skipped
            ));
        }

        let references = match contents.reference_csv {
            Some(csv) => {
                let import = read_reference_minerals(&csv)?;
                for error in import.errors {
                    outcome.skip(format!("{}: {}", REFERENCE_ENTRY, error));
                }
                import.minerals
            }
            None => Vec::new(),
        };

        with_transaction(self.store.as_ref(), |store| {
            apply_archive(store, mode, minerals, references, &mut outcome, cancel)
        })?;

        self.install_media(contents.media, &mut outcome);

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            remapped = outcome.id_remaps.len(),
            "Backup archive imported"
        );
        Ok(outcome)
    }

    /// Temp directory beside the media directory, removed on drop
    fn staging_dir(&self) -> MineralogResult<TempDir> {
        let media_dir = self.store.media_dir();
        let parent = media_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| media_dir.clone());
        fs::create_dir_all(&parent)?;
        tempfile::Builder::new()
            .prefix(".import-")
            .tempdir_in(&parent)
            .map_err(|e| MineralogError::Io(format!("Failed to create staging directory: {}", e)))
    }

    /// Move staged media into the media directory
    fn install_media(&self, media: Vec<StagedMedia>, outcome: &mut ImportOutcome) {
        let media_dir = self.store.media_dir();
        for staged in media {
            let target = media_dir.join(&staged.file_name);
            if let Err(e) = move_file(&staged.path, &target) {
                warn!(file = %staged.file_name, error = %e, "Failed to install media file");
                outcome
                    .warnings
                    .push(format!("Could not restore photo {}: {}", staged.file_name, e));
            }
        }
    }

    /// Write every specimen to a CSV file, returning the row count
    pub fn export_csv(&self, dest: &Path, cancel: &CancelFlag) -> MineralogResult<usize> {
        info!(path = %dest.display(), "Exporting CSV");

        let minerals = self.store.all_minerals()?;
        if minerals.is_empty() {
            return Err(MineralogError::InvalidInput("No minerals to export".into()));
        }

        let temp = sibling_temp_file(dest)?;
        {
            let mut out = write_minerals(BufWriter::new(temp.as_file()), &minerals, cancel)?;
            out.flush()?;
        }
        persist_temp_file(temp, dest)?;

        info!(rows = minerals.len(), "CSV written");
        Ok(minerals.len())
    }

    fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            max_record_bytes: self.csv.max_record_bytes,
            ..ReaderOptions::default()
        }
    }

    /// Import specimens from a CSV file
    ///
    /// `overrides` maps file headers to canonical fields on top of the
    /// automatic mapping. A mapping without `name` fails before any row is
    /// read; bad rows are skipped and reported.
    pub fn import_csv(
        &self,
        src: &Path,
        mode: CsvImportMode,
        overrides: Option<&HashMap<String, String>>,
        cancel: &CancelFlag,
    ) -> MineralogResult<ImportOutcome> {
        info!(path = %src.display(), %mode, "Importing CSV");

        let file = open_file(src)?;
        let rows = CsvRows::open(BufReader::new(file), self.reader_options())?;
        debug!(
            encoding = %rows.encoding(),
            delimiter = ?rows.delimiter(),
            columns = rows.headers().len(),
            "Detected CSV format"
        );

        let mapping = self.mapper.resolve(rows.headers(), overrides)?;
        let mut outcome = ImportOutcome::default();
        for header in &mapping.unmapped {
            let hint = self
                .mapper
                .suggest(header)
                .map(|field| format!(" (did you mean '{}'?)", field))
                .unwrap_or_default();
            outcome
                .warnings
                .push(format!("Column '{}' was ignored{}", header, hint));
        }
        let row_mapper = MineralRowMapper::new(mapping);

        with_transaction(self.store.as_ref(), |store| {
            apply_csv(store, mode, rows, &row_mapper, &mut outcome, cancel)
        })?;

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            "CSV imported"
        );
        Ok(outcome)
    }

    /// Sample the first rows of a CSV file; `max_rows` defaults to the
    /// configured preview size
    pub fn preview_csv(&self, src: &Path, max_rows: Option<usize>) -> MineralogResult<CsvPreview> {
        let file = open_file(src)?;
        let options = self
            .reader_options()
            .with_max_rows(max_rows.unwrap_or(self.csv.preview_rows));
        let parsed = ParseResult::collect(CsvRows::open(BufReader::new(file), options)?)?;

        let mapping = self.mapper.map_headers(&parsed.headers);
        let rows = parsed
            .rows
            .iter()
            .map(|row| {
                parsed
                    .headers
                    .iter()
                    .map(|h| row.get(h).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        Ok(CsvPreview {
            rows,
            encoding: parsed.encoding,
            delimiter: parsed.delimiter,
            mapping: mapping
                .pairs()
                .into_iter()
                .map(|(h, f)| (h.to_string(), f))
                .collect(),
            unmapped: mapping
                .unmapped
                .iter()
                .map(|h| (h.clone(), self.mapper.suggest(h)))
                .collect(),
            errors: parsed.errors.iter().map(ToString::to_string).collect(),
            has_required: mapping.contains(REQUIRED_FIELD),
            headers: parsed.headers,
        })
    }
}

fn open_file(path: &Path) -> MineralogResult<File> {
    File::open(path).map_err(|e| MineralogError::Io(format!("Failed to open {}: {}", path.display(), e)))
}

fn read_manifest(bytes: Option<Vec<u8>>) -> MineralogResult<Manifest> {
    let bytes = bytes
        .ok_or_else(|| MineralogError::Manifest(format!("Backup is missing {}", MANIFEST_ENTRY)))?;
    Manifest::from_slice(&bytes)
}

/// Decode `minerals.json` record by record, skipping the ones that do not fit
fn decode_records(bytes: &[u8], outcome: &mut ImportOutcome) -> MineralogResult<Vec<Mineral>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes)
        .map_err(|e| MineralogError::Json(format!("Invalid {}: {}", RECORDS_ENTRY, e)))?;

    let mut minerals = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Mineral>(value) {
            Ok(mineral) => minerals.push(mineral),
            Err(e) => outcome.skip(format!("Record {}: {}", index + 1, e)),
        }
    }
    Ok(minerals)
}

fn apply_archive<S: CollectionStore + ?Sized>(
    store: &S,
    mode: ArchiveImportMode,
    minerals: Vec<Mineral>,
    references: Vec<ReferenceMineral>,
    outcome: &mut ImportOutcome,
    cancel: &CancelFlag,
) -> MineralogResult<()> {
    if mode == ArchiveImportMode::Replace {
        let removed = store.delete_all_minerals()?;
        let removed_references = store.delete_all_reference_minerals()?;
        debug!(removed, removed_references, "Cleared collection before import");
    }

    let (taken_ids, taken_reference_ids) = match mode {
        ArchiveImportMode::MapIds => {
            let ids: Vec<MineralId> = minerals.iter().map(|m| m.id).collect();
            let reference_ids: Vec<ReferenceMineralId> =
                references.iter().map(|r| r.id.clone()).collect();
            (
                store
                    .minerals_by_ids(&ids)?
                    .into_iter()
                    .map(|m| m.id)
                    .collect::<HashSet<_>>(),
                store
                    .reference_minerals_by_ids(&reference_ids)?
                    .into_iter()
                    .map(|r| r.id)
                    .collect::<HashSet<_>>(),
            )
        }
        ArchiveImportMode::Merge | ArchiveImportMode::Replace => (HashSet::new(), HashSet::new()),
    };

    for (index, mut mineral) in minerals.into_iter().enumerate() {
        cancel.check()?;

        if taken_ids.contains(&mineral.id) {
            let fresh = MineralId::new();
            outcome
                .id_remaps
                .insert(mineral.id.to_string(), fresh.to_string());
            mineral.id = fresh;
        }
        mineral.adopt_children();

        if let Err(message) = mineral.validate() {
            outcome.skip(format!("Record {} ({}): {}", index + 1, mineral.name, message));
            continue;
        }
        let label = format!("Record {} ({})", index + 1, mineral.name);
        if store_record(store.upsert_mineral(mineral), &label, outcome)? {
            outcome.imported += 1;
        }
    }

    for mut reference in references {
        cancel.check()?;

        if taken_reference_ids.contains(&reference.id) {
            let fresh = ReferenceMineralId::new();
            outcome
                .id_remaps
                .insert(reference.id.to_string(), fresh.to_string());
            reference.id = fresh;
        }
        let label = format!("{}: {}", REFERENCE_ENTRY, reference.id);
        store_record(store.upsert_reference_mineral(reference), &label, outcome)?;
    }

    if !outcome.id_remaps.is_empty() {
        warn!(remapped = outcome.id_remaps.len(), "Imported records were given new ids");
        outcome.warnings.push(format!(
            "{} records were given new ids; links between them were not updated",
            outcome.id_remaps.len()
        ));
    }
    Ok(())
}

fn apply_csv<S, R>(
    store: &S,
    mode: CsvImportMode,
    rows: CsvRows<R>,
    mapper: &MineralRowMapper,
    outcome: &mut ImportOutcome,
    cancel: &CancelFlag,
) -> MineralogResult<()>
where
    S: CollectionStore + ?Sized,
    R: std::io::Read,
{
    let mut by_name: HashMap<String, Mineral> = match mode {
        CsvImportMode::Replace => {
            let removed = store.delete_all_minerals()?;
            debug!(removed, "Cleared collection before import");
            HashMap::new()
        }
        CsvImportMode::Merge | CsvImportMode::SkipDuplicates => store
            .all_minerals()?
            .into_iter()
            .map(|m| (m.name_key(), m))
            .collect(),
    };

    for row in rows {
        cancel.check()?;

        let row = match row {
            Ok(row) => row,
            Err(MineralogError::Parse { line, message }) => {
                outcome.skip(format!("Row {}: {}", line, message));
                continue;
            }
            Err(e) => return Err(e),
        };

        let Some(name) = mapper.name(&row) else {
            outcome.skip(format!("Row {}: Name is required", row.line));
            continue;
        };
        let key = normalize_name(name);
        let existing = by_name.get(&key);

        let result = match (mode, existing) {
            (CsvImportMode::SkipDuplicates, Some(existing)) => {
                outcome.skip(format!(
                    "Row {}: Skipped duplicate mineral '{}'",
                    row.line, existing.name
                ));
                continue;
            }
            (CsvImportMode::SkipDuplicates, None) => mapper.to_mineral(&row, None),
            (CsvImportMode::Merge | CsvImportMode::Replace, existing) => {
                mapper.to_mineral(&row, existing)
            }
        };

        match result {
            Ok(mineral) => {
                let label = format!("Row {}", row.line);
                if store_record(store.upsert_mineral(mineral.clone()), &label, outcome)? {
                    by_name.insert(key, mineral);
                    outcome.imported += 1;
                }
            }
            Err(e) if !e.is_fatal() => outcome.skip(format!("Row {}: {}", row.line, row_message(&e))),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Turn a rejected write into a skip; `Ok(true)` when the record was stored
fn store_record(
    result: MineralogResult<()>,
    label: &str,
    outcome: &mut ImportOutcome,
) -> MineralogResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if !e.is_fatal() => {
            outcome.skip(format!("{}: {}", label, row_message(&e)));
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn row_message(err: &MineralogError) -> String {
    match err {
        MineralogError::Validation(message) | MineralogError::Parse { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Rename, falling back to copy and delete across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
