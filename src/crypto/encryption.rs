//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for backup payloads using AES-256-GCM.
//! Each encryption operation generates a unique random nonce; the 128-bit
//! authentication tag is appended to the ciphertext.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use crate::error::{MineralogError, MineralogResult};

use super::key_derivation::KEY_LEN;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// Size of the appended authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Ciphertext plus the nonce it was produced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// The nonce used for this encryption
    pub nonce: [u8; NONCE_LEN],
    /// The encrypted bytes with authentication tag appended
    pub ciphertext: Vec<u8>,
}

fn cipher_for(key: &[u8]) -> MineralogResult<Aes256Gcm> {
    if key.len() != KEY_LEN {
        return Err(MineralogError::InvalidInput(format!(
            "Invalid key size: expected {}, got {}",
            KEY_LEN,
            key.len()
        )));
    }

    Aes256Gcm::new_from_slice(key)
        .map_err(|e| MineralogError::InvalidInput(format!("Failed to create cipher: {}", e)))
}

/// Encrypt plaintext data using AES-256-GCM
///
/// Generates a random nonce for each encryption operation, so identical
/// plaintexts never produce identical ciphertexts.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> MineralogResult<EncryptedData> {
    let cipher = cipher_for(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| MineralogError::InvalidInput(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedData { nonce, ciphertext })
}

/// Decrypt ciphertext using AES-256-GCM
///
/// Any tag mismatch (wrong key, tampered nonce or ciphertext, truncated
/// input) yields the same `AuthenticationFailure`.
pub fn decrypt(ciphertext: &[u8], key: &[u8], nonce: &[u8]) -> MineralogResult<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if nonce.len() != NONCE_LEN {
        return Err(MineralogError::InvalidInput(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_LEN,
            nonce.len()
        )));
    }

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| MineralogError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::{derive_key, fast_params};

    fn test_key() -> [u8; KEY_LEN] {
        let (key, _) = derive_key("test_password", None, &fast_params()).unwrap();
        *key.as_bytes()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = test_key();
        let plaintext = b"Hello, Quartz!";

        let encrypted = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
        assert_eq!(encrypted.ciphertext.len(), plaintext.len() + TAG_LEN);
    }

    #[test]
    fn test_different_nonces() {
        let key = test_key();
        let plaintext = b"Hello, Quartz!";

        let encrypted1 = encrypt(plaintext, &key).unwrap();
        let encrypted2 = encrypt(plaintext, &key).unwrap();

        assert_ne!(encrypted1.nonce, encrypted2.nonce);
        assert_ne!(encrypted1.ciphertext, encrypted2.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = test_key();
        let key2 = test_key();

        let encrypted = encrypt(b"Hello", &key1).unwrap();
        let result = decrypt(&encrypted.ciphertext, &key2, &encrypted.nonce);
        assert!(matches!(result, Err(MineralogError::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt(b"Hello, Quartz!", &key).unwrap();
        encrypted.ciphertext[0] ^= 0x01;

        let result = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce);
        assert!(matches!(result, Err(MineralogError::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let key = test_key();
        let mut encrypted = encrypt(b"Hello, Quartz!", &key).unwrap();
        encrypted.nonce[NONCE_LEN - 1] ^= 0x80;

        let result = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce);
        assert!(matches!(result, Err(MineralogError::AuthenticationFailure)));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let key = test_key();
        let encrypted = encrypt(b"", &key).unwrap();

        let result = decrypt(&encrypted.ciphertext[..TAG_LEN - 1], &key, &encrypted.nonce);
        assert!(matches!(result, Err(MineralogError::AuthenticationFailure)));
    }

    #[test]
    fn test_rejects_bad_key_size() {
        let result = encrypt(b"data", &[0u8; 16]);
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));

        let result = decrypt(b"data", &[0u8; 31], &[0u8; NONCE_LEN]);
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_bad_nonce_size() {
        let key = test_key();
        let encrypted = encrypt(b"data", &key).unwrap();

        let result = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce[..8]);
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = test_key();
        let encrypted = encrypt(b"", &key).unwrap();
        let decrypted = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_large_plaintext() {
        let key = test_key();
        let plaintext: Vec<u8> = (0..100_000).map(|i| (i % 256) as u8).collect();

        let encrypted = encrypt(&plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted.ciphertext, &key, &encrypted.nonce).unwrap();

        assert_eq!(plaintext, decrypted);
    }
}
