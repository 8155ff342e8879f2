//! Archive manifest and schema versioning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::EncryptionMetadata;
use crate::error::{MineralogError, MineralogResult};

/// Producer name written into every manifest
pub const APP_NAME: &str = "MineraLog";

/// Schema written by this version
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Schemas this version can read
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &[CURRENT_SCHEMA_VERSION];

/// Entry counts recorded at export time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCounts {
    #[serde(alias = "minerals")]
    pub records: usize,
    #[serde(alias = "photos")]
    pub media: usize,
}

/// `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub app: String,
    pub schema_version: String,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub counts: ManifestCounts,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    schema_version: Option<String>,
}

impl Manifest {
    /// Manifest for a new export; `encrypted` follows `encryption`
    pub fn new(records: usize, media: usize, encryption: Option<EncryptionMetadata>) -> Self {
        Self {
            app: APP_NAME.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            counts: ManifestCounts { records, media },
            encrypted: encryption.is_some(),
            encryption,
        }
    }

    /// Parse manifest bytes, checking the schema version first
    pub fn from_slice(bytes: &[u8]) -> MineralogResult<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| MineralogError::Manifest(format!("Invalid manifest: {}", e)))?;
        check_schema_version(probe.schema_version.as_deref())?;

        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| MineralogError::Manifest(format!("Invalid manifest: {}", e)))?;
        if manifest.app != APP_NAME {
            warn!(app = %manifest.app, "Manifest written by a different application");
        }
        Ok(manifest)
    }

    pub fn to_vec(&self) -> MineralogResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Encryption block of an encrypted manifest, `None` for plaintext
    pub fn encryption_metadata(&self) -> MineralogResult<Option<&EncryptionMetadata>> {
        match (self.encrypted, &self.encryption) {
            (false, _) => Ok(None),
            (true, Some(metadata)) => Ok(Some(metadata)),
            (true, None) => Err(MineralogError::Manifest(
                "Encrypted backup is missing encryption metadata".into(),
            )),
        }
    }
}

/// Reject any schema outside [`SUPPORTED_SCHEMA_VERSIONS`]
pub fn check_schema_version(found: Option<&str>) -> MineralogResult<()> {
    match found {
        Some(version) if SUPPORTED_SCHEMA_VERSIONS.contains(&version) => Ok(()),
        other => Err(MineralogError::SchemaVersion {
            found: other.unwrap_or("<missing>").to_string(),
            expected: SUPPORTED_SCHEMA_VERSIONS.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let manifest = Manifest::new(3, 2, None);
        let bytes = manifest.to_vec().unwrap();
        let parsed = Manifest::from_slice(&bytes).unwrap();
        assert_eq!(parsed, manifest);
        assert!(!parsed.encrypted);
    }

    #[test]
    fn test_mobile_field_names_accepted() {
        let json = r#"{
            "app": "MineraLog",
            "schemaVersion": "1.0.0",
            "exportedAt": "2024-05-01T10:00:00.123Z",
            "counts": {"minerals": 12, "photos": 4},
            "encrypted": true,
            "encryption": {"algorithm": "Argon2id+AES-256-GCM", "salt": "AAAA", "iv": "BBBB"}
        }"#;
        let manifest = Manifest::from_slice(json.as_bytes()).unwrap();
        assert_eq!(manifest.counts.records, 12);
        assert_eq!(manifest.counts.media, 4);
        let metadata = manifest.encryption_metadata().unwrap().unwrap();
        assert_eq!(metadata.nonce, "BBBB");
        assert!(metadata.kdf.is_none());
    }

    #[test]
    fn test_unsupported_schema_rejected() {
        let json = r#"{"app":"MineraLog","schemaVersion":"2.0.0","counts":{"records":1,"media":0}}"#;
        match Manifest::from_slice(json.as_bytes()) {
            Err(MineralogError::SchemaVersion { found, expected }) => {
                assert_eq!(found, "2.0.0");
                assert_eq!(expected, "1.0.0");
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_checked_before_structure() {
        let json = r#"{"schemaVersion":"0.9.0","counts":"not an object"}"#;
        assert!(matches!(
            Manifest::from_slice(json.as_bytes()),
            Err(MineralogError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn test_missing_schema_rejected() {
        let json = r#"{"app":"MineraLog"}"#;
        assert!(matches!(
            Manifest::from_slice(json.as_bytes()),
            Err(MineralogError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn test_encrypted_without_metadata() {
        let mut manifest = Manifest::new(1, 0, None);
        manifest.encrypted = true;
        assert!(matches!(
            manifest.encryption_metadata(),
            Err(MineralogError::Manifest(_))
        ));
    }

    #[test]
    fn test_garbage_is_manifest_error() {
        assert!(matches!(
            Manifest::from_slice(b"not json"),
            Err(MineralogError::Manifest(_))
        ));
    }
}
