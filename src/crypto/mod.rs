//! Cryptographic functions for MineraLog backups
//!
//! Provides AES-256-GCM encryption with Argon2id key derivation
//! for password-protected backup archives.

pub mod encryption;
pub mod envelope;
pub mod key_derivation;
pub mod secure_memory;
pub mod strength;

pub use encryption::{decrypt, encrypt, EncryptedData};
pub use envelope::{
    decode_base64, encode_base64, EncryptionEnvelope, EncryptionMetadata, PasswordEnvelopeCodec,
    ALGORITHM,
};
pub use key_derivation::{derive_key, generate_salt, DerivedKey, KeyDerivationParams};
pub use secure_memory::{SecureBytes, SecureString};
pub use strength::PasswordStrength;
