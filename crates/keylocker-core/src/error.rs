use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Failures of the symmetric cipher layer.
///
/// Decryption has exactly one failure signal: a wrong key and a tampered or
/// truncated payload are indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    #[error("cipher primitive failure: {0}")]
    Primitive(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Failures reported by a blob backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob '{name}' is {size} bytes, backend limit is {max}")]
    TooLarge { name: String, size: usize, max: usize },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Io(_))
    }
}

/// Errors surfaced by the vault to its callers.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Metadata or an expected chunk is missing.
    #[error("credential not found: {0}")]
    NotFound(String),

    /// Stored bytes failed authentication, decoding, or length checks.
    #[error("credential data is corrupted or was written under a different key: {0}")]
    CorruptedData(String),

    #[error("backend failure: {0}")]
    BackendFailure(#[from] BackendError),

    /// Encrypt-side primitive failure or unusable key material.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl VaultError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }
}
