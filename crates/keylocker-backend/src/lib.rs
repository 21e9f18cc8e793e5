//! keylocker-backend: named, size-limited blob stores
//!
//! The vault consumes a [`BlobBackend`]; exactly one implementation is chosen
//! when the vault is constructed:
//!   - `keyring`   — platform credential store via the `keyring` crate
//!   - `directory` — one file per blob, for headless hosts without a keychain
//!   - `memory`    — process-local map, used by tests
//!
//! [`RetryBackend`] wraps any of them with bounded retries for transient failures.

pub mod directory;
pub mod keychain;
pub mod memory;
pub mod retry;

pub use directory::DirectoryBackend;
pub use keychain::KeyringBackend;
pub use memory::MemoryBackend;
pub use retry::RetryBackend;

use anyhow::{Context, Result};
use keylocker_core::config::{expand_home, BackendConfig, BackendKind};
use keylocker_core::BackendError;
use std::sync::Arc;
use std::time::Duration;

/// A synchronous key/value store for opaque binary blobs with a per-blob size limit.
pub trait BlobBackend: Send + Sync {
    /// Create or replace the blob `name`.
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError>;

    /// Read the blob `name`; a missing blob is [`BackendError::NotFound`].
    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError>;

    /// Remove the blob `name`; a missing blob is [`BackendError::NotFound`].
    fn delete(&self, name: &str) -> Result<(), BackendError>;

    /// Largest blob, in bytes, that `write` accepts.
    fn max_blob_size(&self) -> usize;

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        match self.read(name) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Short label for logs and diagnostics.
    fn describe(&self) -> String;
}

impl<B: BlobBackend + ?Sized> BlobBackend for Arc<B> {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        (**self).write(name, data)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        (**self).read(name)
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        (**self).delete(name)
    }

    fn max_blob_size(&self) -> usize {
        (**self).max_blob_size()
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        (**self).exists(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<B: BlobBackend + ?Sized> BlobBackend for Box<B> {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        (**self).write(name, data)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        (**self).read(name)
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        (**self).delete(name)
    }

    fn max_blob_size(&self) -> usize {
        (**self).max_blob_size()
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        (**self).exists(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Reject `data` before it reaches the store if it exceeds `max`.
pub(crate) fn check_size(name: &str, data: &[u8], max: usize) -> Result<(), BackendError> {
    if data.len() > max {
        return Err(BackendError::TooLarge {
            name: name.to_string(),
            size: data.len(),
            max,
        });
    }
    Ok(())
}

/// Build the backend selected by `cfg`, wrapped in a [`RetryBackend`] when
/// `cfg.max_retries > 0`.
pub fn build_backend(cfg: &BackendConfig) -> Result<Arc<dyn BlobBackend>> {
    let inner: Arc<dyn BlobBackend> = match cfg.kind {
        BackendKind::Keyring => {
            if !keychain::is_available(&cfg.service) {
                anyhow::bail!(
                    "platform credential store is not available for service '{}'\n\
                     Set backend.kind = \"directory\" on hosts without a keychain.",
                    cfg.service
                );
            }
            let persistence = keychain::store_persistence();
            if !matches!(persistence, ::keyring::credential::CredentialPersistence::UntilDelete) {
                use ::keyring::credential::CredentialPersistence as P;
                let persistence = match persistence {
                    P::EntryOnly => "EntryOnly",
                    P::ProcessOnly => "ProcessOnly",
                    P::UntilReboot => "UntilReboot",
                    P::UntilDelete => "UntilDelete",
                    _ => "Unknown",
                };
                tracing::warn!(
                    persistence,
                    "platform credential store does not keep entries until deleted"
                );
            }
            Arc::new(KeyringBackend::new(&cfg.service, cfg.max_blob_size))
        }
        BackendKind::Directory => {
            let dir = expand_home(&cfg.directory);
            let backend = DirectoryBackend::open(&dir, cfg.max_blob_size)
                .with_context(|| format!("opening blob directory: {}", dir.display()))?;
            Arc::new(backend)
        }
        BackendKind::Memory => {
            tracing::warn!("memory backend selected: credentials will not persist");
            Arc::new(MemoryBackend::with_max_blob_size(cfg.max_blob_size))
        }
    };

    tracing::debug!(backend = %inner.describe(), max_blob_size = inner.max_blob_size(), "blob backend ready");

    if cfg.max_retries > 0 {
        Ok(Arc::new(RetryBackend::new(
            inner,
            cfg.max_retries,
            Duration::from_millis(cfg.retry_backoff_ms),
        )))
    } else {
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_backend() {
        let cfg = BackendConfig {
            kind: BackendKind::Memory,
            max_blob_size: 512,
            ..Default::default()
        };
        let backend = build_backend(&cfg).unwrap();
        assert_eq!(backend.max_blob_size(), 512);
        assert!(backend.describe().starts_with("memory"));
    }

    #[test]
    fn test_build_directory_backend_with_retries() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BackendConfig {
            kind: BackendKind::Directory,
            directory: dir.path().join("blobs"),
            max_retries: 2,
            ..Default::default()
        };
        let backend = build_backend(&cfg).unwrap();
        assert!(backend.describe().starts_with("retry("));

        backend.write("a", b"1").unwrap();
        assert_eq!(backend.read("a").unwrap(), b"1");
    }

    #[test]
    fn test_default_exists_via_read() {
        let backend: Box<dyn BlobBackend> = Box::new(MemoryBackend::new());
        assert!(!backend.exists("missing").unwrap());
        backend.write("present", b"x").unwrap();
        assert!(backend.exists("present").unwrap());
    }

    #[test]
    fn test_check_size_boundary() {
        assert!(check_size("n", &[0u8; 4], 4).is_ok());
        let err = check_size("n", &[0u8; 5], 4).unwrap_err();
        assert!(matches!(err, BackendError::TooLarge { size: 5, max: 4, .. }));
    }
}
