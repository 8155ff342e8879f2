//! Strongly-typed ID wrappers for all entity types
//!
//! Using newtype wrappers prevents accidentally mixing up IDs from different
//! entity types at compile time. Collection records use UUIDs; reference
//! minerals come from a bundled dataset whose keys are free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate UUID newtype wrappers
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse an ID from a string
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(MineralId);
define_id!(ProvenanceId);
define_id!(StorageId);
define_id!(PhotoId);
define_id!(ComponentId);

/// Key of a reference mineral
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceMineralId(String);

impl ReferenceMineralId {
    /// Create a new random key
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReferenceMineralId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReferenceMineralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceMineralId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mineral_id_creation() {
        let id = MineralId::new();
        assert!(!id.as_uuid().is_nil());
    }

    #[test]
    fn test_id_display_is_full_uuid() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = MineralId::parse(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_id_equality() {
        let id1 = MineralId::new();
        let id2 = id1;
        assert_eq!(id1, id2);
        assert_ne!(id1, MineralId::new());
    }

    #[test]
    fn test_id_serialization() {
        let id = PhotoId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let deserialized: PhotoId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        assert!(MineralId::parse("not-a-uuid").is_err());
        assert!(" 550e8400-e29b-41d4-a716-446655440000 ".parse::<MineralId>().is_ok());
    }

    #[test]
    fn test_reference_id_accepts_free_form_keys() {
        let id = ReferenceMineralId::from(" quartz-001 ");
        assert_eq!(id.as_str(), "quartz-001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"quartz-001\"");
    }
}
