//! keylocker-vault: encrypted credential records over size-limited blob stores
//!
//! Write pipeline:
//! ```text
//! SecretRecord → JSON → AES-256-GCM → base64 ─┬─ len <= S ─► <prefix>.<name>
//!                                             └─ len >  S ─► <prefix>.<name>.chunk.0 .. chunk.N-1
//!                        ChunkMetadata → AES-256-GCM → base64 ─► <prefix>.<name>.metadata
//! ```
//!
//! The metadata blob is the existence proof for a credential; there is no
//! separate index. [`ChunkedVault`] owns the layout, [`Vault`] is the
//! caller-facing facade.

pub mod chunked;
pub mod names;
pub mod vault;

pub use chunked::{partition, ChunkedVault, DEFAULT_PROBE_LIMIT};
pub use names::BlobNames;
pub use vault::{derive_key_from_config, Vault};

pub use keylocker_core::{ChunkMetadata, SecretRecord, VaultError, VaultResult};
