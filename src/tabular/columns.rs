//! Header to canonical field mapping
//!
//! Spreadsheets arrive with headers in English or French, abbreviated, or in
//! the exact form written by the exporter. Every spelling normalizes to a key
//! (lowercase, no spaces, underscores or hyphens) looked up in an index built
//! once per mapper.

use std::collections::HashMap;

use crate::error::{MineralogError, MineralogResult};

/// Canonical field every mapping must contain
pub const REQUIRED_FIELD: &str = "name";

/// Canonical fields and the header spellings that map to them
const FIELD_SPELLINGS: &[(&str, &[&str])] = &[
    ("mineralType", &["mineral type", "mineral_type", "specimen type", "type de spécimen"]),
    ("name", &["name", "mineral_name", "specimen_name", "mineral", "mineral name", "nom", "nom du minéral"]),
    ("group", &["group", "mineral_group", "classification", "groupe"]),
    ("formula", &["formula", "chemical_formula", "composition", "formule"]),
    ("crystalSystem", &["crystal system", "crystal_system", "crystallography", "system", "système cristallin"]),
    ("mohsMin", &["mohs min", "mohs_min", "hardness min", "hardness_min", "dureté min"]),
    ("mohsMax", &["mohs max", "mohs_max", "hardness max", "hardness_max", "dureté max"]),
    ("mohs", &["mohs", "hardness", "mohs hardness", "dureté"]),
    ("cleavage", &["cleavage", "clivage"]),
    ("fracture", &["fracture", "cassure"]),
    ("luster", &["luster", "lustre", "éclat"]),
    ("streak", &["streak", "trait"]),
    ("diaphaneity", &["diaphaneity", "transparency", "diaphanéité"]),
    ("habit", &["habit", "habitus", "crystal_habit", "faciès"]),
    ("specificGravity", &["specific gravity", "specific_gravity", "density", "sg", "densité"]),
    ("fluorescence", &["fluorescence", "fluorescent", "uv"]),
    ("magnetic", &["magnetic", "magnetism", "magnétisme", "magnétique"]),
    ("radioactive", &["radioactive", "radioactivity", "radioactivité"]),
    ("dimensionsMm", &["dimensions (mm)", "dimensions", "dimensions_mm", "size", "taille"]),
    ("weightGr", &["weight (g)", "weight", "weight_gr", "mass", "poids"]),
    ("rockType", &["rock type", "rock_type", "type de roche"]),
    ("texture", &["texture"]),
    ("dominantMinerals", &["dominant minerals", "dominant_minerals", "minéraux dominants"]),
    ("interestingFeatures", &["interesting features", "interesting_features", "particularités"]),
    ("status", &["status", "statut"]),
    ("statusType", &["status type", "status_type", "type"]),
    ("statusDetails", &["status details", "status_details", "détails du statut"]),
    ("qualityRating", &["quality rating", "quality_rating", "quality", "qualité", "rating"]),
    ("completeness", &["completeness", "complétude"]),
    ("prov_country", &["provenance country", "country", "provenance_country", "prov_country", "pays"]),
    ("prov_locality", &["provenance locality", "locality", "provenance_locality", "prov_locality", "localité"]),
    ("prov_site", &["provenance site", "site", "provenance_site", "prov_site", "mine"]),
    ("prov_latitude", &["provenance latitude", "latitude", "prov_latitude", "lat"]),
    ("prov_longitude", &["provenance longitude", "longitude", "prov_longitude", "lon", "long"]),
    ("prov_acquiredAt", &["provenance acquired at", "acquired_at", "acquisition_date", "prov_date", "date", "date d'acquisition"]),
    ("prov_source", &["provenance source", "source", "provenance_source", "prov_source"]),
    ("prov_price", &["price", "prov_price", "prix", "cost"]),
    ("prov_estimatedValue", &["estimated value", "estimated_value", "prov_value", "value", "valeur"]),
    ("prov_currency", &["currency", "prov_currency", "devise"]),
    ("prov_mineName", &["mine name", "mine_name", "nom de la mine"]),
    ("prov_collectorName", &["collector name", "collector_name", "collector", "collectionneur"]),
    ("prov_dealer", &["dealer", "marchand"]),
    ("prov_catalogNumber", &["catalog number", "catalog_number", "numéro de catalogue"]),
    ("prov_acquisitionNotes", &["acquisition notes", "acquisition_notes"]),
    ("storage_place", &["storage place", "place", "storage_place", "storage_location", "location", "lieu"]),
    ("storage_container", &["storage container", "container", "storage_container", "conteneur"]),
    ("storage_box", &["storage box", "box", "storage_box", "boîte"]),
    ("storage_slot", &["storage slot", "slot", "storage_slot", "position", "emplacement"]),
    ("storage_nfcTagId", &["nfc tag id", "nfc_tag_id", "nfc"]),
    ("storage_qrContent", &["qr content", "qr_content", "qr"]),
    ("notes", &["notes", "note", "comments", "description", "remarques"]),
    ("tags", &["tags", "tag", "keywords", "étiquettes"]),
    ("componentNames", &["component names", "component_names", "components", "composants"]),
    ("componentPercentages", &["component percentages", "component_percentages", "percentages", "pourcentages"]),
    ("componentRoles", &["component roles", "component_roles", "roles", "rôles"]),
];

/// Normalize a header for lookup
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps header spellings to canonical field names
#[derive(Debug, Clone)]
pub struct ColumnMapper {
    index: HashMap<String, &'static str>,
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnMapper {
    pub fn new() -> Self {
        let mut index = HashMap::new();
        for (field, spellings) in FIELD_SPELLINGS {
            for spelling in spellings.iter().copied().chain(std::iter::once(*field)) {
                index.entry(normalize_header(spelling)).or_insert(*field);
            }
        }
        Self { index }
    }

    /// All canonical field names, in export order
    pub fn canonical_fields() -> impl Iterator<Item = &'static str> {
        FIELD_SPELLINGS.iter().map(|(field, _)| *field)
    }

    /// The canonical spelling of `field`, if it is one
    pub fn canonical_field(field: &str) -> Option<&'static str> {
        Self::canonical_fields().find(|known| known.eq_ignore_ascii_case(field.trim()))
    }

    /// Exact lookup of a header
    pub fn field_for(&self, header: &str) -> Option<&'static str> {
        self.index.get(&normalize_header(header)).copied()
    }

    /// Map headers by exact normalized match; the first header claiming a field wins
    pub fn map_headers(&self, headers: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        for header in headers {
            match self.field_for(header) {
                Some(field) if !mapping.by_field.contains_key(field) => {
                    mapping.insert(header, field);
                }
                _ => mapping.unmapped.push(header.clone()),
            }
        }
        mapping
    }

    /// Build the mapping for an import
    ///
    /// `overrides` (header → field) are applied on top of the automatic
    /// mapping. Each must name a header present in the file and a known
    /// field, at most once per field; an empty field drops the header.
    pub fn resolve(
        &self,
        headers: &[String],
        overrides: Option<&HashMap<String, String>>,
    ) -> MineralogResult<ColumnMapping> {
        let mut mapping = self.map_headers(headers);

        if let Some(overrides) = overrides {
            let mut claimed: Vec<&'static str> = Vec::new();
            for (header, field) in overrides {
                if !headers.iter().any(|h| h == header) {
                    return Err(MineralogError::ColumnMapping(format!(
                        "Header '{}' is not present in the file",
                        header
                    )));
                }
                mapping.remove_header(header);
                if field.trim().is_empty() {
                    continue;
                }

                let field = Self::canonical_field(field).ok_or_else(|| {
                    MineralogError::ColumnMapping(format!("Unknown field '{}'", field))
                })?;
                if claimed.contains(&field) {
                    return Err(MineralogError::ColumnMapping(format!(
                        "Field '{}' is mapped more than once",
                        field
                    )));
                }
                claimed.push(field);
                mapping.remove_field(field);
                mapping.insert(header, field);
            }

            mapping.unmapped = headers
                .iter()
                .filter(|h| !mapping.by_header.contains_key(h.as_str()))
                .cloned()
                .collect();
        }

        if mapping.header_for(REQUIRED_FIELD).is_none() {
            return Err(MineralogError::ColumnMapping(
                "No column maps to the required field 'name'".into(),
            ));
        }
        Ok(mapping)
    }

    /// Closest canonical field for an unknown header, for hinting only
    pub fn suggest(&self, header: &str) -> Option<&'static str> {
        let key = normalize_header(header);
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(usize, &'static str)> = None;
        for (spelling, field) in &self.index {
            let distance = levenshtein(&key, spelling);
            let longer = key.chars().count().max(spelling.chars().count());
            let threshold = (longer / 3).max(2);
            if distance > threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((d, f)) => distance < d || (distance == d && *field < f),
            };
            if better {
                best = Some((distance, *field));
            }
        }
        best.map(|(_, field)| field)
    }
}

/// Frozen header ↔ field assignment for one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    by_field: HashMap<&'static str, String>,
    by_header: HashMap<String, &'static str>,
    /// Headers with no field, in file order
    pub unmapped: Vec<String>,
}

impl ColumnMapping {
    fn insert(&mut self, header: &str, field: &'static str) {
        self.by_field.insert(field, header.to_string());
        self.by_header.insert(header.to_string(), field);
    }

    fn remove_header(&mut self, header: &str) {
        if let Some(field) = self.by_header.remove(header) {
            self.by_field.remove(field);
        }
    }

    fn remove_field(&mut self, field: &str) {
        if let Some(header) = self.by_field.remove(field) {
            self.by_header.remove(&header);
        }
    }

    /// Header supplying `field`
    pub fn header_for(&self, field: &str) -> Option<&str> {
        self.by_field.get(field).map(String::as_str)
    }

    pub fn field_for(&self, header: &str) -> Option<&'static str> {
        self.by_header.get(header).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.by_field.contains_key(field)
    }

    /// (header, field) pairs sorted by header
    pub fn pairs(&self) -> Vec<(&str, &'static str)> {
        let mut pairs: Vec<_> = self
            .by_header
            .iter()
            .map(|(h, f)| (h.as_str(), *f))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn len(&self) -> usize {
        self.by_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }
}

/// Edit distance between two strings, by chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn colliding_spellings() -> Vec<String> {
        let mut seen = HashSet::new();
        let mut collisions = Vec::new();
        for (_, spellings) in FIELD_SPELLINGS {
            for spelling in *spellings {
                let key = normalize_header(spelling);
                if !seen.insert(key.clone()) {
                    collisions.push(key);
                }
            }
        }
        collisions
    }

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_header("  Mohs_Min "), "mohsmin");
        assert_eq!(normalize_header("Crystal-System"), "crystalsystem");
        assert_eq!(normalize_header("Localité"), "localité");
    }

    #[test]
    fn test_exact_and_localized_matches() {
        let mapper = ColumnMapper::new();
        assert_eq!(mapper.field_for("Mineral Name"), Some("name"));
        assert_eq!(mapper.field_for("Nom"), Some("name"));
        assert_eq!(mapper.field_for("Localité"), Some("prov_locality"));
        assert_eq!(mapper.field_for("Pays"), Some("prov_country"));
        assert_eq!(mapper.field_for("Système Cristallin"), Some("crystalSystem"));
        assert_eq!(mapper.field_for("Dimensions (mm)"), Some("dimensionsMm"));
        assert_eq!(mapper.field_for("unknown"), None);
    }

    #[test]
    fn test_canonical_names_map_to_themselves() {
        let mapper = ColumnMapper::new();
        assert_eq!(mapper.field_for("mohsMin"), Some("mohsMin"));
        assert_eq!(mapper.field_for("prov_country"), Some("prov_country"));
    }

    #[test]
    fn test_no_spelling_claimed_twice() {
        assert!(colliding_spellings().is_empty(), "{:?}", colliding_spellings());
    }

    #[test]
    fn test_first_header_wins() {
        let mapper = ColumnMapper::new();
        let mapping = mapper.map_headers(&headers(&["Name", "Nom", "Extra"]));
        assert_eq!(mapping.header_for("name"), Some("Name"));
        assert_eq!(mapping.unmapped, vec!["Nom", "Extra"]);
    }

    #[test]
    fn test_resolve_requires_name() {
        let mapper = ColumnMapper::new();
        let result = mapper.resolve(&headers(&["Group", "Formula"]), None);
        assert!(matches!(result, Err(MineralogError::ColumnMapping(_))));
    }

    #[test]
    fn test_resolve_with_override() {
        let mapper = ColumnMapper::new();
        let mut overrides = HashMap::new();
        overrides.insert("Specimen".to_string(), "name".to_string());
        overrides.insert("Where".to_string(), "prov_locality".to_string());

        let mapping = mapper
            .resolve(&headers(&["Specimen", "Where", "Junk"]), Some(&overrides))
            .unwrap();
        assert_eq!(mapping.header_for("name"), Some("Specimen"));
        assert_eq!(mapping.field_for("Where"), Some("prov_locality"));
        assert_eq!(mapping.unmapped, vec!["Junk"]);
    }

    #[test]
    fn test_override_moves_field_and_keeps_auto_mapping() {
        let mapper = ColumnMapper::new();
        let mut overrides = HashMap::new();
        overrides.insert("Label".to_string(), "name".to_string());
        overrides.insert("Formula".to_string(), String::new());

        let mapping = mapper
            .resolve(&headers(&["Name", "Label", "Formula", "Group"]), Some(&overrides))
            .unwrap();
        assert_eq!(mapping.header_for("name"), Some("Label"));
        assert_eq!(mapping.header_for("group"), Some("Group"));
        assert!(!mapping.contains("formula"));
        assert_eq!(mapping.unmapped, vec!["Name", "Formula"]);
    }

    #[test]
    fn test_override_rejects_unknown_header_and_field() {
        let mapper = ColumnMapper::new();
        let file_headers = headers(&["Specimen"]);

        let mut missing = HashMap::new();
        missing.insert("Absent".to_string(), "name".to_string());
        assert!(mapper.resolve(&file_headers, Some(&missing)).is_err());

        let mut unknown = HashMap::new();
        unknown.insert("Specimen".to_string(), "colour".to_string());
        assert!(mapper.resolve(&file_headers, Some(&unknown)).is_err());
    }

    #[test]
    fn test_override_rejects_duplicate_field() {
        let mapper = ColumnMapper::new();
        let mut overrides = HashMap::new();
        overrides.insert("A".to_string(), "name".to_string());
        overrides.insert("B".to_string(), "name".to_string());
        let result = mapper.resolve(&headers(&["A", "B"]), Some(&overrides));
        assert!(matches!(result, Err(MineralogError::ColumnMapping(_))));
    }

    #[test]
    fn test_suggest_close_typos() {
        let mapper = ColumnMapper::new();
        assert_eq!(mapper.suggest("Nme"), Some("name"));
        assert_eq!(mapper.suggest("Formla"), Some("formula"));
        assert_eq!(mapper.suggest("Localty"), Some("prov_locality"));
    }

    #[test]
    fn test_suggest_rejects_distant_headers() {
        let mapper = ColumnMapper::new();
        assert_eq!(mapper.suggest("zzzzzzzzzzzzzz"), None);
        assert_eq!(mapper.suggest(""), None);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("éclat", "eclat"), 1);
    }
}
