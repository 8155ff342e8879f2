//! Archive CLI commands
//!
//! Implements `export-zip`, `import-zip` and `inspect`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::output::{print_export_summary, print_import_outcome};
use super::password::{read_new_password, read_password};
use crate::backup::{ArchiveImportMode, BackgroundJob, BackupService};
use crate::config::Settings;
use crate::error::MineralogResult;
use crate::storage::CollectionStore;

/// Arguments for `export-zip`
#[derive(Args, Debug)]
pub struct ExportZipArgs {
    /// Destination archive
    pub dest: PathBuf,

    /// Encrypt the mineral records with a password
    #[arg(short, long)]
    pub encrypt: bool,
}

/// Arguments for `import-zip`
#[derive(Args, Debug)]
pub struct ImportZipArgs {
    /// Archive to import
    pub src: PathBuf,

    /// How existing records are treated (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ArchiveImportMode>,
}

/// Arguments for `inspect`
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Archive to inspect
    pub src: PathBuf,
}

/// Handle `export-zip`
pub fn handle_export_zip<S>(service: &Arc<BackupService<S>>, args: ExportZipArgs) -> MineralogResult<()>
where
    S: CollectionStore + 'static,
{
    let password = if args.encrypt {
        Some(read_new_password()?)
    } else {
        None
    };

    println!("Exporting to {}...", args.dest.display());
    let service = Arc::clone(service);
    let dest = args.dest;
    let summary = BackgroundJob::spawn("export-zip", move |cancel| {
        service.export_zip(&dest, password.as_ref(), cancel)
    })?
    .wait()?;

    print_export_summary(&summary);
    Ok(())
}

/// Handle `import-zip`
///
/// The password is only asked for when the manifest says the archive is
/// encrypted.
pub fn handle_import_zip<S>(
    service: &Arc<BackupService<S>>,
    settings: &Settings,
    args: ImportZipArgs,
) -> MineralogResult<()>
where
    S: CollectionStore + 'static,
{
    let mode = args.mode.unwrap_or(settings.default_archive_mode);
    let info = service.inspect_archive(&args.src)?;
    let password = if info.manifest.encrypted {
        Some(read_password()?)
    } else {
        None
    };

    println!("Importing {} (mode: {})...", args.src.display(), mode);
    let service = Arc::clone(service);
    let src = args.src;
    let outcome = BackgroundJob::spawn("import-zip", move |cancel| {
        service.import_zip(&src, password.as_ref(), mode, cancel)
    })?
    .wait()?;

    print_import_outcome("Import complete", &outcome);
    Ok(())
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Entry")]
    path: String,
    #[tabled(rename = "Compressed")]
    compressed: u64,
    #[tabled(rename = "Size")]
    size: u64,
}

/// Handle `inspect`
pub fn handle_inspect<S>(service: &BackupService<S>, args: InspectArgs) -> MineralogResult<()>
where
    S: CollectionStore,
{
    let info = service.inspect_archive(&args.src)?;
    let manifest = &info.manifest;

    println!("Archive: {}", args.src.display());
    println!("========");
    println!("Producer:       {}", manifest.app);
    println!("Schema version: {}", manifest.schema_version);
    println!("Exported at:    {}", manifest.exported_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Minerals:       {}", manifest.counts.records);
    println!("Photos:         {}", manifest.counts.media);
    match &manifest.encryption {
        Some(encryption) if manifest.encrypted => {
            println!("Encrypted:      yes ({})", encryption.algorithm);
            let kdf = encryption.kdf_params();
            println!(
                "Key derivation: Argon2id, {} KiB, {} passes, {} lanes",
                kdf.memory_cost, kdf.time_cost, kdf.parallelism
            );
        }
        _ => println!("Encrypted:      {}", if manifest.encrypted { "yes" } else { "no" }),
    }

    println!();
    let rows: Vec<EntryRow> = info
        .entries
        .iter()
        .map(|entry| EntryRow {
            path: entry.path.clone(),
            compressed: entry.compressed_size,
            size: entry.declared_size,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    if !info.rejected.is_empty() {
        println!();
        println!("Rejected entries ({}):", info.rejected.len());
        for message in &info.rejected {
            println!("  - {}", message);
        }
    }

    Ok(())
}
