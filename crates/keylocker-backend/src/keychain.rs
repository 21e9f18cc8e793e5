//! Platform keychain backend.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - Windows: Credential Manager (generic credentials)
//! - macOS: Keychain Services
//! - Linux: kernel keyutils in front of the D-Bus Secret Service
//!
//! keyutils alone keeps entries only until logout or reboot, so on Linux
//! keyutils is used as a cache and the Secret Service (GNOME Keyring,
//! KWallet) holds the persistent copy. A host without a Secret Service
//! daemon reports store failures as `Unavailable`; use the directory backend
//! there.
//!
//! Every blob is one keyring entry under a shared service name, with the blob
//! name as the entry's user. Blobs are stored as binary secrets.

use ::keyring::credential::{CredentialBuilderApi, CredentialPersistence};
use keylocker_core::BackendError;
use zeroize::Zeroize;

use crate::{check_size, BlobBackend};

/// Windows rejects credential blobs above 2560 bytes (`CRED_MAX_CREDENTIAL_BLOB_SIZE`).
pub const WINDOWS_MAX_BLOB_SIZE: usize = 2560;

pub struct KeyringBackend {
    service: String,
    max_blob_size: usize,
}

impl KeyringBackend {
    pub fn new(service: &str, max_blob_size: usize) -> Self {
        KeyringBackend {
            service: service.to_string(),
            max_blob_size,
        }
    }

    fn entry(&self, name: &str) -> Result<::keyring::Entry, BackendError> {
        ::keyring::Entry::new(&self.service, name)
            .map_err(|e| BackendError::Unavailable(format!("keychain entry creation for '{name}': {e}")))
    }
}

fn map_keyring_error(name: &str, op: &str, err: ::keyring::Error) -> BackendError {
    match err {
        ::keyring::Error::NoEntry => BackendError::NotFound(name.to_string()),
        other => BackendError::Unavailable(format!("keychain {op} for '{name}': {other}")),
    }
}

impl BlobBackend for KeyringBackend {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        check_size(name, data, self.max_blob_size)?;
        self.entry(name)?
            .set_secret(data)
            .map_err(|e| map_keyring_error(name, "store", e))?;
        tracing::debug!(blob = name, bytes = data.len(), "stored blob in platform keychain");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.entry(name)?
            .get_secret()
            .map_err(|e| map_keyring_error(name, "get", e))
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.entry(name)?
            .delete_credential()
            .map_err(|e| map_keyring_error(name, "delete", e))?;
        tracing::debug!(blob = name, "deleted blob from platform keychain");
        Ok(())
    }

    fn max_blob_size(&self) -> usize {
        self.max_blob_size
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        match self.entry(name)?.get_secret() {
            Ok(mut secret) => {
                secret.zeroize();
                Ok(true)
            }
            Err(::keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(map_keyring_error(name, "get", e)),
        }
    }

    fn describe(&self) -> String {
        format!("keyring(service={})", self.service)
    }
}

/// How long entries written through the platform store survive.
pub fn store_persistence() -> CredentialPersistence {
    let builder = ::keyring::default::default_credential_builder();
    CredentialBuilderApi::persistence(builder.as_ref())
}

/// Check if the platform keychain is available.
pub fn is_available(service: &str) -> bool {
    ::keyring::Entry::new(service, "__keylocker_probe__").is_ok()
}
