//! Password envelope codec
//!
//! Combines Argon2id key derivation with AES-256-GCM into a self-describing
//! envelope (salt, nonce, ciphertext). The salt and nonce travel in the
//! archive manifest as Base64; the ciphertext is stored as raw bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{MineralogError, MineralogResult};

use super::encryption::{decrypt, encrypt, NONCE_LEN};
use super::key_derivation::{derive_key, KeyDerivationParams, SALT_LEN};
use super::secure_memory::{SecureBytes, SecureString};

/// Scheme name recorded in manifests
pub const ALGORITHM: &str = "Argon2id+AES-256-GCM";

/// Everything needed to decrypt a payload except the password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionEnvelope {
    pub ciphertext: Vec<u8>,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

/// Encryption block of an archive manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMetadata {
    pub algorithm: String,
    /// Base64 salt
    pub salt: String,
    /// Base64 nonce (older archives call it `iv`)
    #[serde(alias = "iv")]
    pub nonce: String,
    /// Argon2 cost used at export time; absent means defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KeyDerivationParams>,
}

impl EncryptionMetadata {
    /// Describe a sealed envelope for the manifest
    pub fn from_envelope(envelope: &EncryptionEnvelope, params: &KeyDerivationParams) -> Self {
        Self {
            algorithm: ALGORITHM.to_string(),
            salt: encode_base64(&envelope.salt),
            nonce: encode_base64(&envelope.nonce),
            kdf: Some(*params),
        }
    }

    /// Rebuild the envelope for a ciphertext read from the archive
    pub fn to_envelope(&self, ciphertext: Vec<u8>) -> MineralogResult<EncryptionEnvelope> {
        if self.algorithm != ALGORITHM {
            return Err(MineralogError::Manifest(format!(
                "Unsupported encryption algorithm: {}",
                self.algorithm
            )));
        }

        let salt: [u8; SALT_LEN] = decode_base64(&self.salt)?.try_into().map_err(|v: Vec<u8>| {
            MineralogError::Manifest(format!(
                "Invalid salt length: expected {}, got {}",
                SALT_LEN,
                v.len()
            ))
        })?;
        let nonce: [u8; NONCE_LEN] =
            decode_base64(&self.nonce)?.try_into().map_err(|v: Vec<u8>| {
                MineralogError::Manifest(format!(
                    "Invalid nonce length: expected {}, got {}",
                    NONCE_LEN,
                    v.len()
                ))
            })?;

        Ok(EncryptionEnvelope {
            ciphertext,
            salt,
            nonce,
        })
    }

    /// KDF parameters to use when opening
    pub fn kdf_params(&self) -> KeyDerivationParams {
        self.kdf.unwrap_or_default()
    }
}

/// Encode bytes as standard Base64
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard Base64
pub fn decode_base64(encoded: &str) -> MineralogResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| MineralogError::InvalidInput(format!("Invalid Base64: {}", e)))
}

/// Seals and opens payloads with a password
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordEnvelopeCodec {
    params: KeyDerivationParams,
}

impl PasswordEnvelopeCodec {
    pub fn new(params: KeyDerivationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KeyDerivationParams {
        &self.params
    }

    /// Encrypt with a fresh salt and nonce
    pub fn seal(&self, plaintext: &[u8], password: &SecureString) -> MineralogResult<EncryptionEnvelope> {
        let (key, salt) = derive_key(password.as_str(), None, &self.params)?;
        let encrypted = encrypt(plaintext, key.as_bytes())?;

        Ok(EncryptionEnvelope {
            ciphertext: encrypted.ciphertext,
            salt,
            nonce: encrypted.nonce,
        })
    }

    /// Decrypt an envelope; any KDF or tag failure becomes `Decryption`
    pub fn open(&self, envelope: &EncryptionEnvelope, password: &SecureString) -> MineralogResult<SecureBytes> {
        let (key, _) = derive_key(password.as_str(), Some(envelope.salt), &self.params)
            .map_err(MineralogError::decryption)?;

        decrypt(&envelope.ciphertext, key.as_bytes(), &envelope.nonce)
            .map(SecureBytes::from)
            .map_err(MineralogError::decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::fast_params;
    use std::collections::HashSet;

    fn codec() -> PasswordEnvelopeCodec {
        PasswordEnvelopeCodec::new(fast_params())
    }

    fn password() -> SecureString {
        SecureString::new("correct horse battery staple")
    }

    #[test]
    fn test_round_trip() {
        for plaintext in [&b""[..], b"a", b"[{\"name\":\"Quartz\"}]"] {
            let envelope = codec().seal(plaintext, &password()).unwrap();
            let opened = codec().open(&envelope, &password()).unwrap();
            assert_eq!(opened.as_bytes(), plaintext);
        }
    }

    #[test]
    fn test_wrong_password_is_decryption_failure() {
        let envelope = codec().seal(b"payload", &password()).unwrap();
        let result = codec().open(&envelope, &SecureString::new("wrong"));
        assert!(matches!(result, Err(MineralogError::Decryption(_))));
    }

    #[test]
    fn test_empty_password_rejected_on_seal() {
        let result = codec().seal(b"payload", &SecureString::new(""));
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));
    }

    #[test]
    fn test_single_bit_tampering_detected() {
        for size in [0usize, 1, 64] {
            let plaintext = vec![7u8; size];
            let envelope = codec().seal(&plaintext, &password()).unwrap();

            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered.salt[0] ^= 1 << bit;
                assert!(matches!(
                    codec().open(&tampered, &password()),
                    Err(MineralogError::Decryption(_))
                ));

                let mut tampered = envelope.clone();
                tampered.nonce[NONCE_LEN - 1] ^= 1 << bit;
                assert!(matches!(
                    codec().open(&tampered, &password()),
                    Err(MineralogError::Decryption(_))
                ));

                let mut tampered = envelope.clone();
                let last = tampered.ciphertext.len() - 1;
                tampered.ciphertext[last] ^= 1 << bit;
                assert!(matches!(
                    codec().open(&tampered, &password()),
                    Err(MineralogError::Decryption(_))
                ));
            }
        }
    }

    #[test]
    fn test_nonce_and_salt_uniqueness() {
        let codec = codec();
        let mut nonces = HashSet::new();
        let mut salts = HashSet::new();
        let mut ciphertexts = HashSet::new();

        for _ in 0..100 {
            let envelope = codec.seal(b"same plaintext", &password()).unwrap();
            nonces.insert(envelope.nonce);
            salts.insert(envelope.salt);
            ciphertexts.insert(envelope.ciphertext);
        }

        assert_eq!(nonces.len(), 100);
        assert_eq!(salts.len(), 100);
        assert_eq!(ciphertexts.len(), 100);
    }

    #[test]
    fn test_metadata_round_trip() {
        let envelope = codec().seal(b"payload", &password()).unwrap();
        let metadata = EncryptionMetadata::from_envelope(&envelope, &fast_params());
        assert_eq!(metadata.algorithm, ALGORITHM);

        let rebuilt = metadata.to_envelope(envelope.ciphertext.clone()).unwrap();
        assert_eq!(rebuilt, envelope);
        assert_eq!(metadata.kdf_params(), fast_params());
    }

    #[test]
    fn test_metadata_accepts_iv_alias() {
        let json = r#"{"algorithm":"Argon2id+AES-256-GCM","salt":"AAAAAAAAAAAAAAAAAAAAAA==","iv":"AAAAAAAAAAAAAAAA"}"#;
        let metadata: EncryptionMetadata = serde_json::from_str(json).unwrap();
        let envelope = metadata.to_envelope(Vec::new()).unwrap();
        assert_eq!(envelope.salt, [0u8; SALT_LEN]);
        assert_eq!(envelope.nonce, [0u8; NONCE_LEN]);
        assert_eq!(metadata.kdf_params(), KeyDerivationParams::default());
    }

    #[test]
    fn test_metadata_rejects_bad_lengths() {
        let metadata = EncryptionMetadata {
            algorithm: ALGORITHM.to_string(),
            salt: encode_base64(&[1, 2, 3]),
            nonce: encode_base64(&[0u8; NONCE_LEN]),
            kdf: None,
        };
        assert!(matches!(
            metadata.to_envelope(Vec::new()),
            Err(MineralogError::Manifest(_))
        ));
    }

    #[test]
    fn test_metadata_rejects_unknown_algorithm() {
        let metadata = EncryptionMetadata {
            algorithm: "ROT13".to_string(),
            salt: encode_base64(&[0u8; SALT_LEN]),
            nonce: encode_base64(&[0u8; NONCE_LEN]),
            kdf: None,
        };
        assert!(metadata.to_envelope(Vec::new()).is_err());
    }

    #[test]
    fn test_base64_helpers() {
        assert_eq!(encode_base64(b"mineral"), "bWluZXJhbA==");
        assert_eq!(decode_base64("bWluZXJhbA==").unwrap(), b"mineral");
        assert!(decode_base64("not base64!").is_err());
    }
}
