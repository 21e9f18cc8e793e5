//! AES-256-GCM payload encryption/decryption
//!
//! Encrypted payload format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Every call to [`encrypt`] draws a fresh nonce from the thread-local CSPRNG.
//! Decryption reports a single error, [`CryptoError::AuthenticationFailed`],
//! for wrong keys, truncation and tampering alike.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keylocker_core::CryptoError;
use rand::RngCore;

use crate::key::VaultKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key`.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Primitive(format!("AES-256-GCM encryption failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a payload produced by [`encrypt`].
pub fn decrypt(key: &VaultKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// [`encrypt`], then STANDARD base64 for storage in text-oriented backends.
pub fn encrypt_to_base64(key: &VaultKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    encrypt(key, plaintext).map(|payload| STANDARD.encode(payload))
}

/// Decode and decrypt the output of [`encrypt_to_base64`].
///
/// Undecodable text fails the same way a bad tag does.
pub fn decrypt_from_base64(key: &VaultKey, encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let payload = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    decrypt(key, &payload)
}
