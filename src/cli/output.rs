//! Terminal rendering of import and export results

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{ExportSummary, ImportOutcome};

/// Errors listed before the rest are summarized
const MAX_LISTED_ERRORS: usize = 20;

/// Print an export summary
pub fn print_export_summary(summary: &ExportSummary) {
    println!("Export complete");
    println!("===============");
    println!("File:       {}", summary.path.display());
    println!("Minerals:   {}", summary.records);
    println!("References: {}", summary.reference_records);
    println!("Photos:     {}", summary.media);
    println!("Encrypted:  {}", if summary.encrypted { "yes" } else { "no" });

    if !summary.missing_media.is_empty() {
        println!();
        println!("Photos not found on disk ({}):", summary.missing_media.len());
        for name in &summary.missing_media {
            println!("  - {}", name);
        }
    }
}

#[derive(Tabled)]
struct RemapRow<'a> {
    #[tabled(rename = "Old id")]
    old: &'a str,
    #[tabled(rename = "New id")]
    new: &'a str,
}

/// Print an import outcome
pub fn print_import_outcome(title: &str, outcome: &ImportOutcome) {
    println!("{}", title);
    println!("{}", "=".repeat(title.chars().count()));
    println!("Imported: {}", outcome.imported);
    println!("Skipped:  {}", outcome.skipped);

    if !outcome.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &outcome.warnings {
            println!("  - {}", warning);
        }
    }

    if !outcome.id_remaps.is_empty() {
        println!();
        println!("Re-keyed records:");
        let rows: Vec<RemapRow<'_>> = outcome
            .id_remaps
            .iter()
            .map(|(old, new)| RemapRow { old, new })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }

    if outcome.has_errors() {
        println!();
        println!("Errors ({}):", outcome.errors.len());
        for error in outcome.errors.iter().take(MAX_LISTED_ERRORS) {
            println!("  - {}", error);
        }
        if outcome.errors.len() > MAX_LISTED_ERRORS {
            println!("  ... and {} more", outcome.errors.len() - MAX_LISTED_ERRORS);
        }
    }
}
