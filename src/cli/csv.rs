//! CSV CLI commands
//!
//! Implements `export-csv`, `import-csv` and `preview-csv`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tabled::builder::Builder;
use tabled::settings::Style;

use super::output::print_import_outcome;
use crate::backup::{BackgroundJob, BackupService, CsvImportMode, CsvPreview};
use crate::config::Settings;
use crate::error::MineralogResult;
use crate::storage::CollectionStore;

/// Arguments for `export-csv`
#[derive(Args, Debug)]
pub struct ExportCsvArgs {
    /// Destination CSV file
    pub dest: PathBuf,
}

/// Arguments for `import-csv`
#[derive(Args, Debug)]
pub struct ImportCsvArgs {
    /// CSV file to import
    pub src: PathBuf,

    /// How rows matching an existing name are treated (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<CsvImportMode>,

    /// Map a file header to a field, e.g. --map "Nom commun=name"; an empty
    /// field ignores the column
    #[arg(long = "map", value_name = "HEADER=FIELD", value_parser = parse_column_override)]
    pub overrides: Vec<(String, String)>,
}

/// Arguments for `preview-csv`
#[derive(Args, Debug)]
pub struct PreviewCsvArgs {
    /// CSV file to preview
    pub src: PathBuf,

    /// Number of data rows to show
    #[arg(short = 'n', long)]
    pub rows: Option<usize>,
}

/// Parse a `HEADER=FIELD` pair
pub fn parse_column_override(raw: &str) -> Result<(String, String), String> {
    let (header, field) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected HEADER=FIELD, got '{}'", raw))?;
    if header.is_empty() {
        return Err("header must not be empty".into());
    }
    Ok((header.to_string(), field.trim().to_string()))
}

/// Handle `export-csv`
pub fn handle_export_csv<S>(service: &Arc<BackupService<S>>, args: ExportCsvArgs) -> MineralogResult<()>
where
    S: CollectionStore + 'static,
{
    let service = Arc::clone(service);
    let dest = args.dest.clone();
    let written = BackgroundJob::spawn("export-csv", move |cancel| service.export_csv(&dest, cancel))?
        .wait()?;

    println!("Exported {} minerals to {}", written, args.dest.display());
    Ok(())
}

/// Handle `import-csv`
pub fn handle_import_csv<S>(
    service: &Arc<BackupService<S>>,
    settings: &Settings,
    args: ImportCsvArgs,
) -> MineralogResult<()>
where
    S: CollectionStore + 'static,
{
    let mode = args.mode.unwrap_or(settings.default_csv_mode);
    let overrides: Option<HashMap<String, String>> = if args.overrides.is_empty() {
        None
    } else {
        Some(args.overrides.into_iter().collect())
    };

    println!("Importing {} (mode: {})...", args.src.display(), mode);
    let service = Arc::clone(service);
    let src = args.src;
    let outcome = BackgroundJob::spawn("import-csv", move |cancel| {
        service.import_csv(&src, mode, overrides.as_ref(), cancel)
    })?
    .wait()?;

    print_import_outcome("Import complete", &outcome);
    Ok(())
}

/// Handle `preview-csv`
pub fn handle_preview_csv<S>(service: &BackupService<S>, args: PreviewCsvArgs) -> MineralogResult<()>
where
    S: CollectionStore,
{
    let preview = service.preview_csv(&args.src, args.rows)?;
    print_preview(&preview);
    Ok(())
}

fn delimiter_label(delimiter: char) -> String {
    match delimiter {
        '\t' => "tab".to_string(),
        other => format!("'{}'", other),
    }
}

fn print_preview(preview: &CsvPreview) {
    println!("Encoding:  {}", preview.encoding);
    println!("Delimiter: {}", delimiter_label(preview.delimiter));
    println!();

    if preview.headers.is_empty() {
        println!("The file has no header row.");
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(preview.headers.iter().cloned());
    for row in &preview.rows {
        builder.push_record(row.iter().cloned());
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{}", table);

    println!();
    println!("Column mapping");
    println!("--------------");
    for (header, field) in &preview.mapping {
        println!("  {} -> {}", header, field);
    }
    for (header, suggestion) in &preview.unmapped {
        match suggestion {
            Some(field) => println!("  {} (ignored; did you mean '{}'?)", header, field),
            None => println!("  {} (ignored)", header),
        }
    }

    if !preview.has_required {
        println!();
        println!("No column maps to 'name'. Use --map HEADER=name when importing.");
    }

    if !preview.errors.is_empty() {
        println!();
        println!("Problems in the sampled rows:");
        for error in &preview.errors {
            println!("  - {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_override() {
        assert_eq!(
            parse_column_override("Nom commun=name").unwrap(),
            ("Nom commun".to_string(), "name".to_string())
        );
        assert_eq!(
            parse_column_override("Junk=").unwrap(),
            ("Junk".to_string(), String::new())
        );
        assert!(parse_column_override("name").is_err());
        assert!(parse_column_override("=name").is_err());
    }

    #[test]
    fn test_delimiter_label() {
        assert_eq!(delimiter_label('\t'), "tab");
        assert_eq!(delimiter_label(';'), "';'");
    }
}
