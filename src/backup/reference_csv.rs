//! Reference mineral CSV carried inside backup archives

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use super::mineral_csv::{parse_decimal, parse_timestamp};
use super::worker::CancelFlag;
use crate::error::MineralogResult;
use crate::models::{ReferenceMineral, ReferenceMineralId};
use crate::tabular::{parse, Cell, CsvRow, CsvWriter, ReaderOptions};

/// Column order of `reference_minerals.csv`
pub const REFERENCE_HEADERS: [&str; 24] = [
    "id",
    "nameFr",
    "nameEn",
    "synonyms",
    "mineralGroup",
    "formula",
    "mohsMin",
    "mohsMax",
    "density",
    "crystalSystem",
    "cleavage",
    "fracture",
    "habit",
    "luster",
    "streak",
    "diaphaneity",
    "fluorescence",
    "magnetism",
    "radioactivity",
    "notes",
    "isUserDefined",
    "source",
    "createdAt",
    "updatedAt",
];

/// Write reference minerals and return the underlying writer
pub fn write_reference_minerals<W: Write>(
    out: W,
    minerals: &[ReferenceMineral],
    cancel: &CancelFlag,
) -> MineralogResult<W> {
    let mut writer = CsvWriter::new(out);
    writer.write_header(REFERENCE_HEADERS)?;

    for r in minerals {
        cancel.check()?;
        let values = reference_row(r);
        let cells: Vec<Cell<'_>> = values
            .iter()
            .map(|(value, raw)| if *raw { Cell::Raw(value) } else { Cell::Text(value) })
            .collect();
        writer.write_cells(&cells)?;
    }

    writer.finish()
}

/// Cells for one reference mineral; `true` marks values written unguarded
fn reference_row(r: &ReferenceMineral) -> Vec<(String, bool)> {
    let text = |v: &Option<String>| (v.clone().unwrap_or_default(), false);
    let number = |v: Option<f32>| (v.map(|v| v.to_string()).unwrap_or_default(), true);
    let instant = |t: &DateTime<Utc>| (t.to_rfc3339_opts(SecondsFormat::AutoSi, true), true);

    vec![
        (r.id.as_str().to_string(), false),
        (r.name_fr.clone(), false),
        (r.name_en.clone(), false),
        text(&r.synonyms),
        text(&r.mineral_group),
        text(&r.formula),
        number(r.mohs_min),
        number(r.mohs_max),
        number(r.density),
        text(&r.crystal_system),
        text(&r.cleavage),
        text(&r.fracture),
        text(&r.habit),
        text(&r.luster),
        text(&r.streak),
        text(&r.diaphaneity),
        text(&r.fluorescence),
        text(&r.magnetism),
        text(&r.radioactivity),
        text(&r.notes),
        (r.is_user_defined.to_string(), true),
        text(&r.source),
        instant(&r.created_at),
        instant(&r.updated_at),
    ]
}

/// Parsed reference minerals plus per-row errors
#[derive(Debug, Default)]
pub struct ReferenceImport {
    pub minerals: Vec<ReferenceMineral>,
    pub errors: Vec<String>,
}

/// Read `reference_minerals.csv`
///
/// Rows without an id or either name are skipped with an error. Numbers
/// that do not parse are dropped, and timestamps that do not parse become
/// the current time.
pub fn read_reference_minerals(bytes: &[u8]) -> MineralogResult<ReferenceImport> {
    let parsed = parse(bytes, ReaderOptions::default())?;
    let mut import = ReferenceImport {
        errors: parsed.errors.iter().map(ToString::to_string).collect(),
        ..ReferenceImport::default()
    };

    for row in &parsed.rows {
        match reference_from_row(row) {
            Ok(mineral) => import.minerals.push(mineral),
            Err(message) => import.errors.push(format!("Line {}: {}", row.line, message)),
        }
    }

    Ok(import)
}

fn reference_from_row(row: &CsvRow) -> Result<ReferenceMineral, String> {
    let cell = |header: &str| {
        row.get(header)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let required = |header: &str| cell(header).ok_or_else(|| format!("Missing {}", header));
    let decimal = |header: &str| cell(header).and_then(|v| parse_decimal::<f32>(&v));
    let instant = |header: &str| -> DateTime<Utc> {
        cell(header)
            .and_then(|v| parse_timestamp(&v))
            .unwrap_or_else(Utc::now)
    };

    Ok(ReferenceMineral {
        id: ReferenceMineralId::from(required("id")?.as_str()),
        name_fr: required("nameFr")?,
        name_en: required("nameEn")?,
        synonyms: cell("synonyms"),
        mineral_group: cell("mineralGroup"),
        formula: cell("formula"),
        mohs_min: decimal("mohsMin"),
        mohs_max: decimal("mohsMax"),
        density: decimal("density"),
        crystal_system: cell("crystalSystem"),
        cleavage: cell("cleavage"),
        fracture: cell("fracture"),
        habit: cell("habit"),
        luster: cell("luster"),
        streak: cell("streak"),
        diaphaneity: cell("diaphaneity"),
        fluorescence: cell("fluorescence"),
        magnetism: cell("magnetism"),
        radioactivity: cell("radioactivity"),
        notes: cell("notes"),
        is_user_defined: cell("isUserDefined").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        source: cell("source"),
        created_at: instant("createdAt"),
        updated_at: instant("updatedAt"),
    })
}
