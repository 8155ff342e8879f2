//! Reference mineral model
//!
//! Entries of the mineral reference library (bundled dataset plus
//! user-defined additions). Aggregate components may point at one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ReferenceMineralId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceMineral {
    pub id: ReferenceMineralId,
    pub name_fr: String,
    pub name_en: String,
    pub synonyms: Option<String>,
    pub mineral_group: Option<String>,
    pub formula: Option<String>,
    pub mohs_min: Option<f32>,
    pub mohs_max: Option<f32>,
    pub density: Option<f32>,
    pub crystal_system: Option<String>,
    pub cleavage: Option<String>,
    pub fracture: Option<String>,
    pub habit: Option<String>,
    pub luster: Option<String>,
    pub streak: Option<String>,
    pub diaphaneity: Option<String>,
    pub fluorescence: Option<String>,
    pub magnetism: Option<String>,
    pub radioactivity: Option<String>,
    pub notes: Option<String>,
    pub is_user_defined: bool,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReferenceMineral {
    pub fn new(name_fr: impl Into<String>, name_en: impl Into<String>) -> Self {
        Self {
            name_fr: name_fr.into(),
            name_en: name_en.into(),
            ..Default::default()
        }
    }
}

impl Default for ReferenceMineral {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: ReferenceMineralId::new(),
            name_fr: String::new(),
            name_en: String::new(),
            synonyms: None,
            mineral_group: None,
            formula: None,
            mohs_min: None,
            mohs_max: None,
            density: None,
            crystal_system: None,
            cleavage: None,
            fracture: None,
            habit: None,
            luster: None,
            streak: None,
            diaphaneity: None,
            fluorescence: None,
            magnetism: None,
            radioactivity: None,
            notes: None,
            is_user_defined: false,
            source: None,
            created_at: now,
            updated_at: now,
        }
    }
}
