//! Specimen CSV interchange
//!
//! Export writes one row per specimen under [`CSV_HEADERS`]. Import maps a
//! parsed row onto either a fresh specimen or, when merging, a copy of the
//! existing one so that empty cells keep what is already stored.

use std::collections::HashSet;
use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::worker::CancelFlag;
use crate::error::{MineralogError, MineralogResult};
use crate::models::{ComponentId, ComponentRole, Mineral, MineralComponent, MineralType};
use crate::tabular::columns::REQUIRED_FIELD;
use crate::tabular::{Cell, ColumnMapping, CsvRow, CsvWriter};

/// Export header row, in column order
pub const CSV_HEADERS: [&str; 54] = [
    "Mineral Type",
    "Name",
    "Group",
    "Formula",
    "Streak",
    "Luster",
    "Mohs Min",
    "Mohs Max",
    "Crystal System",
    "Specific Gravity",
    "Cleavage",
    "Fracture",
    "Diaphaneity",
    "Habit",
    "Fluorescence",
    "Radioactive",
    "Magnetic",
    "Dimensions (mm)",
    "Weight (g)",
    "Rock Type",
    "Texture",
    "Dominant Minerals",
    "Interesting Features",
    "Status",
    "Status Type",
    "Status Details",
    "Quality Rating",
    "Completeness",
    "Provenance Country",
    "Provenance Locality",
    "Provenance Site",
    "Provenance Latitude",
    "Provenance Longitude",
    "Provenance Acquired At",
    "Provenance Source",
    "Price",
    "Estimated Value",
    "Currency",
    "Mine Name",
    "Collector Name",
    "Dealer",
    "Catalog Number",
    "Acquisition Notes",
    "Storage Place",
    "Storage Container",
    "Storage Box",
    "Storage Slot",
    "NFC Tag ID",
    "QR Content",
    "Notes",
    "Tags",
    "Component Names",
    "Component Percentages",
    "Component Roles",
];

/// Separator for list-valued cells
const LIST_SEPARATOR: &str = "; ";

const PROVENANCE_FIELDS: &[&str] = &[
    "prov_country",
    "prov_locality",
    "prov_site",
    "prov_latitude",
    "prov_longitude",
    "prov_acquiredAt",
    "prov_source",
    "prov_price",
    "prov_estimatedValue",
    "prov_currency",
    "prov_mineName",
    "prov_collectorName",
    "prov_dealer",
    "prov_catalogNumber",
    "prov_acquisitionNotes",
];

const STORAGE_FIELDS: &[&str] = &[
    "storage_place",
    "storage_container",
    "storage_box",
    "storage_slot",
    "storage_nfcTagId",
    "storage_qrContent",
];

const COMPONENT_FIELDS: &[&str] = &["componentNames", "componentPercentages", "componentRoles"];

/// Write every specimen as CSV and return the underlying writer
pub fn write_minerals<W: Write>(
    out: W,
    minerals: &[Mineral],
    cancel: &CancelFlag,
) -> MineralogResult<W> {
    let mut writer = CsvWriter::new(out);
    writer.write_header(CSV_HEADERS)?;

    for mineral in minerals {
        cancel.check()?;
        let row = export_row(mineral);
        writer.write_cells(&row.cells())?;
    }

    writer.finish()
}

#[derive(Default)]
struct ExportRow {
    values: Vec<(String, bool)>,
}

impl ExportRow {
    fn text(&mut self, value: Option<&str>) -> &mut Self {
        self.values.push((value.unwrap_or_default().to_string(), false));
        self
    }

    fn raw(&mut self, value: Option<String>) -> &mut Self {
        self.values.push((value.unwrap_or_default(), true));
        self
    }

    fn cells(&self) -> Vec<Cell<'_>> {
        self.values
            .iter()
            .map(|(value, raw)| {
                if *raw {
                    Cell::Raw(value)
                } else {
                    Cell::Text(value)
                }
            })
            .collect()
    }
}

fn number<T: Display>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn export_row(m: &Mineral) -> ExportRow {
    let p = m.provenance.as_ref();
    let s = m.storage.as_ref();

    let tags = m.tags.join(LIST_SEPARATOR);
    let component_names = m
        .components
        .iter()
        .map(|c| c.mineral_name.as_str())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    let component_percentages = m
        .components
        .iter()
        .map(|c| number(c.percentage).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    let component_roles = m
        .components
        .iter()
        .map(|c| c.role.to_string())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    let mineral_type = m.mineral_type.to_string();

    let mut row = ExportRow::default();
    row.text(Some(mineral_type.as_str()))
        .text(Some(m.name.as_str()))
        .text(m.group.as_deref())
        .text(m.formula.as_deref())
        .text(m.streak.as_deref())
        .text(m.luster.as_deref())
        .raw(number(m.mohs_min))
        .raw(number(m.mohs_max))
        .text(m.crystal_system.as_deref())
        .raw(number(m.specific_gravity))
        .text(m.cleavage.as_deref())
        .text(m.fracture.as_deref())
        .text(m.diaphaneity.as_deref())
        .text(m.habit.as_deref())
        .text(m.fluorescence.as_deref())
        .raw(Some(m.radioactive.to_string()))
        .raw(Some(m.magnetic.to_string()))
        .text(m.dimensions_mm.as_deref())
        .raw(number(m.weight_gr))
        .text(m.rock_type.as_deref())
        .text(m.texture.as_deref())
        .text(m.dominant_minerals.as_deref())
        .text(m.interesting_features.as_deref())
        .text(Some(m.status.as_str()))
        .text(Some(m.status_type.as_str()))
        .text(m.status_details.as_deref())
        .raw(number(m.quality_rating))
        .raw(Some(m.completeness.to_string()))
        .text(p.and_then(|p| p.country.as_deref()))
        .text(p.and_then(|p| p.locality.as_deref()))
        .text(p.and_then(|p| p.site.as_deref()))
        .raw(number(p.and_then(|p| p.latitude)))
        .raw(number(p.and_then(|p| p.longitude)))
        .raw(timestamp(p.and_then(|p| p.acquired_at)))
        .text(p.and_then(|p| p.source.as_deref()))
        .raw(number(p.and_then(|p| p.price)))
        .raw(number(p.and_then(|p| p.estimated_value)))
        .text(p.and_then(|p| p.currency.as_deref()))
        .text(p.and_then(|p| p.mine_name.as_deref()))
        .text(p.and_then(|p| p.collector_name.as_deref()))
        .text(p.and_then(|p| p.dealer.as_deref()))
        .text(p.and_then(|p| p.catalog_number.as_deref()))
        .text(p.and_then(|p| p.acquisition_notes.as_deref()))
        .text(s.and_then(|s| s.place.as_deref()))
        .text(s.and_then(|s| s.container.as_deref()))
        .text(s.and_then(|s| s.box_.as_deref()))
        .text(s.and_then(|s| s.slot.as_deref()))
        .text(s.and_then(|s| s.nfc_tag_id.as_deref()))
        .text(s.and_then(|s| s.qr_content.as_deref()))
        .text(m.notes.as_deref())
        .text(Some(tags.as_str()))
        .text(Some(component_names.as_str()))
        .raw(Some(component_percentages))
        .raw(Some(component_roles));
    row
}

/// Parse a decimal, accepting `,` as the separator when there is no `.`
pub fn parse_decimal<T: FromStr>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    raw.parse().ok().or_else(|| {
        if raw.contains(',') && !raw.contains('.') {
            raw.replace(',', ".").parse().ok()
        } else {
            None
        }
    })
}

/// Parse a yes/no cell in English or French
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "y" | "oui" => Some(true),
        "false" | "no" | "0" | "n" | "non" => Some(false),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp, or a bare date taken as midnight UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc())
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn invalid(message: String) -> MineralogError {
    MineralogError::Validation(message)
}

/// Turns CSV rows into specimens under a resolved column mapping
#[derive(Debug, Clone)]
pub struct MineralRowMapper {
    mapping: ColumnMapping,
}

impl MineralRowMapper {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Trimmed, non-empty cell for a canonical field
    fn value<'r>(&self, row: &'r CsvRow, field: &str) -> Option<&'r str> {
        self.mapping
            .header_for(field)
            .and_then(|header| row.get(header))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn text(&self, row: &CsvRow, field: &str) -> Option<String> {
        self.value(row, field).map(str::to_string)
    }

    fn decimal<T: FromStr>(&self, row: &CsvRow, field: &str) -> Option<T> {
        self.value(row, field).and_then(parse_decimal)
    }

    fn integer(&self, row: &CsvRow, field: &str) -> Option<i32> {
        self.value(row, field).and_then(|v| v.parse().ok())
    }

    fn boolean(&self, row: &CsvRow, field: &str) -> MineralogResult<Option<bool>> {
        match self.value(row, field) {
            None => Ok(None),
            Some(raw) => parse_bool(raw)
                .map(Some)
                .ok_or_else(|| invalid(format!("Invalid boolean value '{}' for {}", raw, field))),
        }
    }

    fn timestamp(&self, row: &CsvRow, field: &str) -> MineralogResult<Option<DateTime<Utc>>> {
        match self.value(row, field) {
            None => Ok(None),
            Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
                invalid(format!(
                    "Invalid date format for {}: '{}'. Expected RFC 3339 (e.g. 2024-01-15T10:30:00Z)",
                    field, raw
                ))
            }),
        }
    }

    fn any_value(&self, row: &CsvRow, fields: &[&str]) -> bool {
        fields.iter().any(|field| self.value(row, field).is_some())
    }

    /// The row's specimen name, if present
    pub fn name<'r>(&self, row: &'r CsvRow) -> Option<&'r str> {
        self.value(row, REQUIRED_FIELD)
    }

    /// Build a specimen from a row
    ///
    /// With `existing`, its ids (and those of its embedded records) are kept
    /// and empty cells fall back to its values. Photos are never touched.
    pub fn to_mineral(&self, row: &CsvRow, existing: Option<&Mineral>) -> MineralogResult<Mineral> {
        let name = self
            .text(row, REQUIRED_FIELD)
            .or_else(|| existing.map(|e| e.name.clone()))
            .ok_or_else(|| invalid("Name is required".to_string()))?;

        let mut m = existing.cloned().unwrap_or_default();
        m.name = name;

        if let Some(raw) = self.value(row, "mineralType") {
            m.mineral_type = MineralType::parse(raw)
                .ok_or_else(|| invalid(format!("Invalid mineral type '{}'", raw)))?;
        }

        // A single hardness column sets both bounds
        let mohs = self.decimal::<f32>(row, "mohs");
        merge(&mut m.mohs_min, self.decimal(row, "mohsMin").or(mohs));
        merge(&mut m.mohs_max, self.decimal(row, "mohsMax").or(mohs));

        merge(&mut m.group, self.text(row, "group"));
        merge(&mut m.formula, self.text(row, "formula"));
        merge(&mut m.crystal_system, self.text(row, "crystalSystem"));
        merge(&mut m.cleavage, self.text(row, "cleavage"));
        merge(&mut m.fracture, self.text(row, "fracture"));
        merge(&mut m.luster, self.text(row, "luster"));
        merge(&mut m.streak, self.text(row, "streak"));
        merge(&mut m.diaphaneity, self.text(row, "diaphaneity"));
        merge(&mut m.habit, self.text(row, "habit"));
        merge(&mut m.specific_gravity, self.decimal(row, "specificGravity"));
        merge(&mut m.fluorescence, self.text(row, "fluorescence"));
        if let Some(magnetic) = self.boolean(row, "magnetic")? {
            m.magnetic = magnetic;
        }
        if let Some(radioactive) = self.boolean(row, "radioactive")? {
            m.radioactive = radioactive;
        }
        merge(&mut m.dimensions_mm, self.text(row, "dimensionsMm"));
        merge(&mut m.weight_gr, self.decimal(row, "weightGr"));
        merge(&mut m.rock_type, self.text(row, "rockType"));
        merge(&mut m.texture, self.text(row, "texture"));
        merge(&mut m.dominant_minerals, self.text(row, "dominantMinerals"));
        merge(&mut m.interesting_features, self.text(row, "interestingFeatures"));
        merge(&mut m.notes, self.text(row, "notes"));
        if let Some(raw) = self.value(row, "tags") {
            m.tags = split_list(raw);
        }
        if let Some(status) = self.text(row, "status") {
            m.status = status;
        }
        if let Some(status_type) = self.text(row, "statusType") {
            m.status_type = status_type;
        }
        merge(&mut m.status_details, self.text(row, "statusDetails"));
        merge(&mut m.quality_rating, self.integer(row, "qualityRating"));
        if let Some(completeness) = self.integer(row, "completeness") {
            m.completeness = completeness;
        }

        if m.provenance.is_some() || self.any_value(row, PROVENANCE_FIELDS) {
            let mut p = m.provenance.take().unwrap_or_default();
            merge(&mut p.country, self.text(row, "prov_country"));
            merge(&mut p.locality, self.text(row, "prov_locality"));
            merge(&mut p.site, self.text(row, "prov_site"));
            merge(&mut p.latitude, self.decimal(row, "prov_latitude"));
            merge(&mut p.longitude, self.decimal(row, "prov_longitude"));
            merge(&mut p.acquired_at, self.timestamp(row, "prov_acquiredAt")?);
            merge(&mut p.source, self.text(row, "prov_source"));
            merge(&mut p.price, self.decimal(row, "prov_price"));
            merge(&mut p.estimated_value, self.decimal(row, "prov_estimatedValue"));
            merge(&mut p.currency, self.text(row, "prov_currency"));
            if p.currency.is_none() {
                p.currency = Some("USD".to_string());
            }
            merge(&mut p.mine_name, self.text(row, "prov_mineName"));
            merge(&mut p.collector_name, self.text(row, "prov_collectorName"));
            merge(&mut p.dealer, self.text(row, "prov_dealer"));
            merge(&mut p.catalog_number, self.text(row, "prov_catalogNumber"));
            merge(&mut p.acquisition_notes, self.text(row, "prov_acquisitionNotes"));
            m.provenance = Some(p);
        }

        if m.storage.is_some() || self.any_value(row, STORAGE_FIELDS) {
            let mut s = m.storage.take().unwrap_or_default();
            merge(&mut s.place, self.text(row, "storage_place"));
            merge(&mut s.container, self.text(row, "storage_container"));
            merge(&mut s.box_, self.text(row, "storage_box"));
            merge(&mut s.slot, self.text(row, "storage_slot"));
            merge(&mut s.nfc_tag_id, self.text(row, "storage_nfcTagId"));
            merge(&mut s.qr_content, self.text(row, "storage_qrContent"));
            m.storage = Some(s);
        }

        if COMPONENT_FIELDS.iter().any(|field| self.mapping.contains(field)) {
            m.components = parse_components(
                self.value(row, "componentNames"),
                self.value(row, "componentPercentages"),
                self.value(row, "componentRoles"),
                &m.components,
            )?;
        }

        m.updated_at = Utc::now();
        m.adopt_children();
        m.validate().map_err(MineralogError::Validation)?;
        Ok(m)
    }
}

/// Rebuild the component list from `;`-separated cells
///
/// Each name reuses an existing component with the same name, else the one at
/// the same position; an existing component is reused at most once. Blank
/// names keep the existing list.
pub fn parse_components(
    names: Option<&str>,
    percentages: Option<&str>,
    roles: Option<&str>,
    existing: &[MineralComponent],
) -> MineralogResult<Vec<MineralComponent>> {
    let names = names.map(split_list).unwrap_or_default();
    if names.is_empty() {
        return Ok(existing.to_vec());
    }

    let percentages: Vec<&str> = percentages
        .map(|raw| raw.split(';').map(str::trim).collect())
        .unwrap_or_default();
    let roles: Vec<&str> = roles
        .map(|raw| raw.split(';').map(str::trim).collect())
        .unwrap_or_default();

    let mut claimed: HashSet<ComponentId> = HashSet::new();
    let mut components = Vec::with_capacity(names.len());

    for (index, name) in names.into_iter().enumerate() {
        let key = name.to_lowercase();
        let by_name = existing
            .iter()
            .rev()
            .find(|c| c.mineral_name.trim().to_lowercase() == key)
            .filter(|c| !claimed.contains(&c.id));
        let fallback = by_name.or_else(|| existing.get(index).filter(|c| !claimed.contains(&c.id)));
        if let Some(fallback) = fallback {
            claimed.insert(fallback.id);
        }

        let percentage = percentages
            .get(index)
            .and_then(|raw| parse_decimal::<f32>(raw))
            .or_else(|| fallback.and_then(|f| f.percentage));

        let role = match roles.get(index).filter(|raw| !raw.is_empty()) {
            Some(raw) => ComponentRole::parse(raw)
                .ok_or_else(|| invalid(format!("Invalid component role '{}'", raw)))?,
            None => fallback
                .map(|f| f.role)
                .unwrap_or_else(|| ComponentRole::from_percentage(percentage)),
        };

        let mut component = match fallback {
            Some(f) => f.clone(),
            None => MineralComponent::default(),
        };
        component.mineral_name = name;
        component.percentage = percentage;
        component.role = role;
        component.updated_at = Utc::now();
        components.push(component);
    }

    Ok(components)
}
