//! Key derivation: passphrase → vault key
//!
//! The default derivation hashes the passphrase with SHA-256 and mixes in no
//! salt: the passphrase is the whole secret, and the same passphrase always
//! opens the same vault. Callers that want a salted, memory-hard derivation
//! opt in to [`derive_key_argon2id`] and own the salt.

use argon2::{Algorithm, Argon2, Params, Version};
use keylocker_core::CryptoError;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::key::VaultKey;
use crate::KEY_SIZE;

/// Derive a 256-bit key as the SHA-256 digest of the passphrase's UTF-8 bytes.
pub fn derive_key(passphrase: &SecretString) -> VaultKey {
    let digest = Sha256::digest(passphrase.expose_secret().as_bytes());
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&digest);
    VaultKey::from_bytes(bytes)
}

/// Argon2id parameters for the salted derivation
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 256-bit key from a passphrase and a 16-byte salt using Argon2id.
pub fn derive_key_argon2id(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfParams,
) -> Result<VaultKey, CryptoError> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::InvalidKey(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Primitive(format!("Argon2id KDF failed: {e}")))?;

    tracing::debug!(
        mem_cost_kib = params.mem_cost_kib,
        time_cost = params.time_cost,
        parallelism = params.parallelism,
        "derived vault key with Argon2id"
    );
    Ok(VaultKey::from_bytes(key))
}
