//! keylocker-crypto: authenticated encryption of credential payloads
//!
//! Payload format (binary, before transport encoding):
//! ```text
//! [12 bytes: random nonce][N bytes: AES-256-GCM ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Key derivation:
//! ```text
//! passphrase ──SHA-256──────────────► VaultKey (256-bit)     default, unsalted
//! passphrase ──Argon2id(salt)───────► VaultKey (256-bit)     caller opt-in
//! generate_random_key() ──base64────► VaultKey::from_base64  machine keys
//! ```

pub mod cipher;
pub mod kdf;
pub mod key;

pub use cipher::{decrypt, decrypt_from_base64, encrypt, encrypt_to_base64};
pub use kdf::{derive_key, derive_key_argon2id, KdfParams};
pub use key::{generate_random_key, VaultKey};

/// Size of a vault key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
