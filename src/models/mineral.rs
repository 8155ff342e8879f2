//! Mineral specimen model
//!
//! A specimen in the user's collection together with the records embedded
//! in it: provenance, storage location, photos and aggregate components.
//! Serialized camelCase, which is the primary payload of a backup archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ComponentId, MineralId, PhotoId, ProvenanceId, ReferenceMineralId, StorageId};

/// Whether a specimen is a single mineral or a rock/aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MineralType {
    #[default]
    Simple,
    Aggregate,
}

impl MineralType {
    /// Parse a mineral type case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "aggregate" => Some(Self::Aggregate),
            _ => None,
        }
    }
}

impl fmt::Display for MineralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "SIMPLE"),
            Self::Aggregate => write!(f, "AGGREGATE"),
        }
    }
}

/// Share of a component within an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentRole {
    /// More than 20%
    Principal,
    /// 5 to 20%
    Accessory,
    /// Under 5%
    Trace,
}

impl ComponentRole {
    /// Parse a role case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "principal" => Some(Self::Principal),
            "accessory" => Some(Self::Accessory),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    /// Derive a role from a percentage
    pub fn from_percentage(percentage: Option<f32>) -> Self {
        match percentage {
            Some(p) if p > 20.0 => Self::Principal,
            Some(p) if p >= 5.0 => Self::Accessory,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal => write!(f, "PRINCIPAL"),
            Self::Accessory => write!(f, "ACCESSORY"),
            Self::Trace => write!(f, "TRACE"),
        }
    }
}

/// Where and how a specimen was acquired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Provenance {
    pub id: ProvenanceId,
    pub mineral_id: MineralId,
    pub site: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub price: Option<f32>,
    pub estimated_value: Option<f32>,
    pub currency: Option<String>,
    pub mine_name: Option<String>,
    pub collector_name: Option<String>,
    pub dealer: Option<String>,
    pub catalog_number: Option<String>,
    pub acquisition_notes: Option<String>,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            id: ProvenanceId::new(),
            mineral_id: MineralId::new(),
            site: None,
            locality: None,
            country: None,
            latitude: None,
            longitude: None,
            acquired_at: None,
            source: None,
            price: None,
            estimated_value: None,
            currency: Some("USD".to_string()),
            mine_name: None,
            collector_name: None,
            dealer: None,
            catalog_number: None,
            acquisition_notes: None,
        }
    }
}

/// Physical storage location of a specimen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageLocation {
    pub id: StorageId,
    pub mineral_id: MineralId,
    pub place: Option<String>,
    pub container: Option<String>,
    #[serde(rename = "box")]
    pub box_: Option<String>,
    pub slot: Option<String>,
    pub nfc_tag_id: Option<String>,
    pub qr_content: Option<String>,
}

/// A photo attached to a specimen; the image file lives in the media directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Photo {
    pub id: PhotoId,
    pub mineral_id: MineralId,
    #[serde(rename = "type")]
    pub photo_type: String,
    pub caption: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub file_name: String,
}

impl Default for Photo {
    fn default() -> Self {
        Self {
            id: PhotoId::new(),
            mineral_id: MineralId::new(),
            photo_type: "NORMAL".to_string(),
            caption: None,
            taken_at: None,
            file_name: String::new(),
        }
    }
}

/// One mineral inside an aggregate specimen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MineralComponent {
    pub id: ComponentId,
    pub reference_mineral_id: Option<ReferenceMineralId>,
    pub mineral_name: String,
    pub mineral_group: Option<String>,
    pub percentage: Option<f32>,
    pub role: ComponentRole,
    pub mohs_min: Option<f32>,
    pub mohs_max: Option<f32>,
    pub density: Option<f32>,
    pub formula: Option<String>,
    pub crystal_system: Option<String>,
    pub luster: Option<String>,
    pub diaphaneity: Option<String>,
    pub cleavage: Option<String>,
    pub fracture: Option<String>,
    pub habit: Option<String>,
    pub streak: Option<String>,
    pub fluorescence: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MineralComponent {
    pub fn new(mineral_name: impl Into<String>, percentage: Option<f32>) -> Self {
        Self {
            mineral_name: mineral_name.into(),
            percentage,
            role: ComponentRole::from_percentage(percentage),
            ..Default::default()
        }
    }
}

impl Default for MineralComponent {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: ComponentId::new(),
            reference_mineral_id: None,
            mineral_name: String::new(),
            mineral_group: None,
            percentage: None,
            role: ComponentRole::Trace,
            mohs_min: None,
            mohs_max: None,
            density: None,
            formula: None,
            crystal_system: None,
            luster: None,
            diaphaneity: None,
            cleavage: None,
            fracture: None,
            habit: None,
            streak: None,
            fluorescence: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A specimen in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mineral {
    pub id: MineralId,
    pub name: String,
    pub mineral_type: MineralType,
    pub group: Option<String>,
    pub formula: Option<String>,
    pub crystal_system: Option<String>,
    pub mohs_min: Option<f32>,
    pub mohs_max: Option<f32>,
    pub cleavage: Option<String>,
    pub fracture: Option<String>,
    pub luster: Option<String>,
    pub streak: Option<String>,
    pub diaphaneity: Option<String>,
    pub habit: Option<String>,
    pub specific_gravity: Option<f32>,
    pub fluorescence: Option<String>,
    pub magnetic: bool,
    pub radioactive: bool,
    pub dimensions_mm: Option<String>,
    pub weight_gr: Option<f32>,
    pub rock_type: Option<String>,
    pub texture: Option<String>,
    pub dominant_minerals: Option<String>,
    pub interesting_features: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub status_type: String,
    pub status_details: Option<String>,
    pub quality_rating: Option<i32>,
    pub completeness: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provenance: Option<Provenance>,
    pub storage: Option<StorageLocation>,
    pub photos: Vec<Photo>,
    pub components: Vec<MineralComponent>,
}

impl Default for Mineral {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: MineralId::new(),
            name: String::new(),
            mineral_type: MineralType::Simple,
            group: None,
            formula: None,
            crystal_system: None,
            mohs_min: None,
            mohs_max: None,
            cleavage: None,
            fracture: None,
            luster: None,
            streak: None,
            diaphaneity: None,
            habit: None,
            specific_gravity: None,
            fluorescence: None,
            magnetic: false,
            radioactive: false,
            dimensions_mm: None,
            weight_gr: None,
            rock_type: None,
            texture: None,
            dominant_minerals: None,
            interesting_features: None,
            notes: None,
            tags: Vec::new(),
            status: "incomplete".to_string(),
            status_type: "in_collection".to_string(),
            status_details: None,
            quality_rating: None,
            completeness: 0,
            created_at: now,
            updated_at: now,
            provenance: None,
            storage: None,
            photos: Vec::new(),
            components: Vec::new(),
        }
    }
}

impl Mineral {
    /// Create a new specimen with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Lowercased, trimmed name used to match CSV rows against the collection
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Point embedded records at this specimen's id
    pub fn adopt_children(&mut self) {
        let id = self.id;
        if let Some(provenance) = self.provenance.as_mut() {
            provenance.mineral_id = id;
        }
        if let Some(storage) = self.storage.as_mut() {
            storage.mineral_id = id;
        }
        for photo in &mut self.photos {
            photo.mineral_id = id;
        }
    }

    /// Validate domain constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        for (label, value) in [("Mohs Min", self.mohs_min), ("Mohs Max", self.mohs_max)] {
            if let Some(v) = value {
                if !(1.0..=10.0).contains(&v) {
                    return Err(format!("{} must be between 1.0 and 10.0 (got: {})", label, v));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.mohs_min, self.mohs_max) {
            if min > max {
                return Err(format!("Mohs Min ({}) exceeds Mohs Max ({})", min, max));
            }
        }
        if let Some(rating) = self.quality_rating {
            if !(1..=5).contains(&rating) {
                return Err(format!("Quality rating must be between 1 and 5 (got: {})", rating));
            }
        }
        if !(0..=100).contains(&self.completeness) {
            return Err(format!(
                "Completeness must be between 0 and 100 (got: {})",
                self.completeness
            ));
        }
        if let Some(provenance) = &self.provenance {
            if let Some(lat) = provenance.latitude {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(format!("Latitude must be between -90.0 and 90.0 (got: {})", lat));
                }
            }
            if let Some(lon) = provenance.longitude {
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(format!(
                        "Longitude must be between -180.0 and 180.0 (got: {})",
                        lon
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Normalize a specimen name for case-insensitive matching
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mineral_defaults() {
        let mineral = Mineral::new("Quartz");
        assert_eq!(mineral.name, "Quartz");
        assert_eq!(mineral.mineral_type, MineralType::Simple);
        assert_eq!(mineral.status, "incomplete");
        assert_eq!(mineral.status_type, "in_collection");
        assert_eq!(mineral.completeness, 0);
        assert!(mineral.validate().is_ok());
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut mineral = Mineral::new("Quartz");
        mineral.mohs_min = Some(7.0);
        mineral.storage = Some(StorageLocation {
            box_: Some("B1".into()),
            ..Default::default()
        });

        let json = serde_json::to_value(&mineral).unwrap();
        assert_eq!(json["mohsMin"], 7.0);
        assert_eq!(json["mineralType"], "SIMPLE");
        assert_eq!(json["storage"]["box"], "B1");
    }

    #[test]
    fn test_deserializes_sparse_record() {
        let json = r#"{"id":"550e8400-e29b-41d4-a716-446655440000","name":"Calcite"}"#;
        let mineral: Mineral = serde_json::from_str(json).unwrap();
        assert_eq!(mineral.name, "Calcite");
        assert_eq!(mineral.status, "incomplete");
        assert!(mineral.photos.is_empty());
    }

    #[test]
    fn test_validate_ranges() {
        let mut mineral = Mineral::new("Quartz");
        mineral.mohs_min = Some(11.0);
        assert!(mineral.validate().is_err());

        let mut mineral = Mineral::new("Quartz");
        mineral.provenance = Some(Provenance {
            latitude: Some(91.0),
            ..Default::default()
        });
        assert!(mineral.validate().unwrap_err().contains("Latitude"));

        let mut mineral = Mineral::new("Quartz");
        mineral.quality_rating = Some(0);
        assert!(mineral.validate().is_err());

        assert!(Mineral::new("  ").validate().is_err());
    }

    #[test]
    fn test_component_role_from_percentage() {
        assert_eq!(ComponentRole::from_percentage(Some(45.0)), ComponentRole::Principal);
        assert_eq!(ComponentRole::from_percentage(Some(20.0)), ComponentRole::Accessory);
        assert_eq!(ComponentRole::from_percentage(Some(5.0)), ComponentRole::Accessory);
        assert_eq!(ComponentRole::from_percentage(Some(1.0)), ComponentRole::Trace);
        assert_eq!(ComponentRole::from_percentage(None), ComponentRole::Trace);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(MineralType::parse("aggregate"), Some(MineralType::Aggregate));
        assert_eq!(MineralType::parse("rock"), None);
        assert_eq!(ComponentRole::parse("Principal"), Some(ComponentRole::Principal));
    }

    #[test]
    fn test_adopt_children() {
        let mut mineral = Mineral::new("Granite");
        mineral.provenance = Some(Provenance::default());
        mineral.photos.push(Photo::default());
        mineral.adopt_children();

        assert_eq!(mineral.provenance.as_ref().unwrap().mineral_id, mineral.id);
        assert_eq!(mineral.photos[0].mineral_id, mineral.id);
    }
}
