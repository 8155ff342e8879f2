use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;

use mineralog::backup::BackupService;
use mineralog::cli::{
    handle_export_csv, handle_export_zip, handle_import_csv, handle_import_zip, handle_inspect,
    handle_preview_csv, ExportCsvArgs, ExportZipArgs, ImportCsvArgs, ImportZipArgs, InspectArgs,
    PreviewCsvArgs,
};
use mineralog::config::paths::DATA_DIR_ENV;
use mineralog::config::{MineralogPaths, Settings};
use mineralog::logging::init_logging;
use mineralog::storage::JsonCollectionStore;

#[derive(Parser)]
#[command(
    name = "mineralog",
    version,
    about = "Backup and CSV interchange for a MineraLog mineral collection",
    long_about = "Exports and imports a MineraLog collection as ZIP backups, optionally \
                  encrypted with a password, and as CSV spreadsheets."
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Collection directory
    #[arg(long, global = true, env = DATA_DIR_ENV, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the collection to a ZIP backup
    ExportZip(ExportZipArgs),

    /// Restore a ZIP backup into the collection
    ImportZip(ImportZipArgs),

    /// Write the collection to a CSV file
    ExportCsv(ExportCsvArgs),

    /// Import minerals from a CSV file
    ImportCsv(ImportCsvArgs),

    /// Show detected format, first rows and column mapping of a CSV file
    PreviewCsv(PreviewCsvArgs),

    /// Show the manifest and entries of a ZIP backup
    Inspect(InspectArgs),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;

    let paths = match cli.data_dir {
        Some(dir) => MineralogPaths::with_base_dir(dir),
        None => MineralogPaths::new()?,
    };
    paths.ensure_directories()?;
    let settings = Settings::load_or_create(&paths)?;
    debug!(base_dir = %paths.base_dir().display(), "Using collection directory");

    if let Commands::Config = cli.command {
        print_config(&paths, &settings);
        return Ok(());
    }

    let store = Arc::new(JsonCollectionStore::open(&paths)?);
    let service = Arc::new(BackupService::with_settings(store, &settings));

    match cli.command {
        Commands::ExportZip(args) => handle_export_zip(&service, args)?,
        Commands::ImportZip(args) => handle_import_zip(&service, &settings, args)?,
        Commands::ExportCsv(args) => handle_export_csv(&service, args)?,
        Commands::ImportCsv(args) => handle_import_csv(&service, &settings, args)?,
        Commands::PreviewCsv(args) => handle_preview_csv(&*service, args)?,
        Commands::Inspect(args) => handle_inspect(&*service, args)?,
        Commands::Config => {}
    }

    Ok(())
}

fn print_config(paths: &MineralogPaths, settings: &Settings) {
    println!("MineraLog Configuration");
    println!("=======================");
    println!("Base directory:   {}", paths.base_dir().display());
    println!("Data directory:   {}", paths.data_dir().display());
    println!("Media directory:  {}", paths.media_dir().display());
    println!("Export directory: {}", paths.export_dir().display());
    println!("Settings file:    {}", paths.settings_file().display());
    println!();
    println!("Settings:");
    println!("  Default archive import mode: {}", settings.default_archive_mode);
    println!("  Default CSV import mode:     {}", settings.default_csv_mode);
    println!("  CSV preview rows:            {}", settings.csv.preview_rows);
    println!(
        "  Argon2id cost:               {} KiB, {} passes, {} lanes",
        settings.key_derivation.memory_cost,
        settings.key_derivation.time_cost,
        settings.key_derivation.parallelism
    );
    println!(
        "  Max archive size:            {} bytes",
        settings.archive_limits.max_archive_bytes
    );
    println!(
        "  Max compression ratio:       {}",
        settings.archive_limits.max_ratio
    );
}
