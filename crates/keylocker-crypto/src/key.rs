//! Vault key type and random key generation

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keylocker_core::CryptoError;
use rand::RngCore;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct VaultKey {
    bytes: [u8; KEY_SIZE],
}

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Use the output of [`generate_random_key`] directly as key material.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("base64 decode: {e}")))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "decoded key is {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for VaultKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random 256-bit key, base64-encoded for storage or display.
pub fn generate_random_key() -> String {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    let encoded = STANDARD.encode(bytes);
    bytes.zeroize();
    encoded
}
