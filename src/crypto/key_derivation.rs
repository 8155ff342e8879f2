//! Key derivation using Argon2id
//!
//! Derives encryption keys from user passwords using Argon2id,
//! a memory-hard key derivation function resistant to GPU/ASIC attacks.
//! Same password and salt always yield the same key; there is no stored
//! verification hash, a wrong password surfaces as an authentication failure.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MineralogError, MineralogResult};

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Tunable Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDerivationParams {
    /// Memory cost in KiB (default: 131072 = 128 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 4)
    pub time_cost: u32,
    /// Parallelism degree (default: 2)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 131_072, // 128 MiB
            time_cost: 4,
            parallelism: 2,
        }
    }
}

impl KeyDerivationParams {
    /// Create params with specific values
    pub fn with_values(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    fn argon2(&self) -> MineralogResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| MineralogError::InvalidInput(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A derived encryption key, wiped when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive an encryption key from a password
///
/// When `salt` is `None` a fresh random salt is generated. The salt used is
/// returned alongside the key so callers can record it.
pub fn derive_key(
    password: &str,
    salt: Option<[u8; SALT_LEN]>,
    params: &KeyDerivationParams,
) -> MineralogResult<(DerivedKey, [u8; SALT_LEN])> {
    if password.is_empty() {
        return Err(MineralogError::InvalidInput(
            "Password must not be empty".to_string(),
        ));
    }

    let salt = salt.unwrap_or_else(generate_salt);
    let argon2 = params.argon2()?;

    let mut key = DerivedKey { key: [0u8; KEY_LEN] };
    argon2
        .hash_password_into(password.as_bytes(), &salt, &mut key.key)
        .map_err(|e| MineralogError::InvalidInput(format!("Key derivation failed: {}", e)))?;

    Ok((key, salt))
}

/// Cheap parameters so test suites stay fast
#[cfg(test)]
pub(crate) fn fast_params() -> KeyDerivationParams {
    KeyDerivationParams::with_values(1024, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key() {
        let (key, salt) = derive_key("test_password", None, &fast_params()).unwrap();
        assert_eq!(key.as_bytes().len(), KEY_LEN);
        assert_eq!(salt.len(), SALT_LEN);
    }

    #[test]
    fn test_same_password_same_salt_same_key() {
        let salt = generate_salt();
        let (key1, _) = derive_key("test_password", Some(salt), &fast_params()).unwrap();
        let (key2, _) = derive_key("test_password", Some(salt), &fast_params()).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_password_different_key() {
        let salt = generate_salt();
        let (key1, _) = derive_key("password1", Some(salt), &fast_params()).unwrap();
        let (key2, _) = derive_key("password2", Some(salt), &fast_params()).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let (key1, salt1) = derive_key("same_password", None, &fast_params()).unwrap();
        let (key2, salt2) = derive_key("same_password", None, &fast_params()).unwrap();
        assert_ne!(salt1, salt2);
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = derive_key("", None, &fast_params());
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KeyDerivationParams::with_values(1, 1, 1);
        let result = derive_key("password", None, &params);
        assert!(matches!(result, Err(MineralogError::InvalidInput(_))));
    }

    #[test]
    fn test_default_params() {
        let params = KeyDerivationParams::default();
        assert_eq!(params.memory_cost, 131_072);
        assert_eq!(params.time_cost, 4);
        assert_eq!(params.parallelism, 2);
    }

    #[test]
    fn test_debug_is_redacted() {
        let (key, _) = derive_key("secret", None, &fast_params()).unwrap();
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }
}
