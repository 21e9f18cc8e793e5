pub mod config;
pub mod error;
pub mod types;

pub use error::{BackendError, CryptoError, VaultError, VaultResult};
pub use types::{ChunkMetadata, SecretRecord};
