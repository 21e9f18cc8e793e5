//! Caller-facing vault: one application's credentials under one key.

use std::sync::Arc;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keylocker_backend::{build_backend, BlobBackend};
use keylocker_core::config::{CryptoConfig, KdfKind, KeylockerConfig, VaultConfig};
use keylocker_core::{CryptoError, SecretRecord, VaultError, VaultResult};
use keylocker_crypto::{derive_key, derive_key_argon2id, KdfParams, VaultKey};
use secrecy::SecretString;
use serde_json::Value;

use crate::chunked::ChunkedVault;

/// Derive the vault key for `passphrase` using the KDF selected in `cfg`.
pub fn derive_key_from_config(
    cfg: &CryptoConfig,
    passphrase: &SecretString,
) -> Result<VaultKey, CryptoError> {
    match cfg.kdf {
        KdfKind::Sha256 => Ok(derive_key(passphrase)),
        KdfKind::Argon2id => {
            let encoded = cfg
                .kdf_salt
                .as_deref()
                .ok_or_else(|| CryptoError::InvalidKey("argon2id requires crypto.kdf_salt".into()))?;
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("kdf_salt base64 decode: {e}")))?;
            let salt: [u8; 16] = decoded.as_slice().try_into().map_err(|_| {
                CryptoError::InvalidKey(format!("kdf_salt is {} bytes (expected 16)", decoded.len()))
            })?;
            let params = KdfParams {
                mem_cost_kib: cfg.argon2_mem_cost_kib,
                time_cost: cfg.argon2_time_cost,
                parallelism: cfg.argon2_parallelism,
            };
            derive_key_argon2id(passphrase, &salt, &params)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vault {
    inner: ChunkedVault,
    crypto: CryptoConfig,
}

impl Vault {
    /// Open the vault for `app_name` with the default (SHA-256) key derivation.
    pub fn new(backend: Arc<dyn BlobBackend>, app_name: &str, passphrase: &SecretString) -> Self {
        Self::with_key(backend, app_name, derive_key(passphrase))
    }

    pub fn with_key(backend: Arc<dyn BlobBackend>, app_name: &str, key: VaultKey) -> Self {
        let prefix = VaultConfig {
            app_name: app_name.to_string(),
            ..Default::default()
        }
        .blob_prefix();
        Vault {
            inner: ChunkedVault::new(backend, key, prefix),
            crypto: CryptoConfig::default(),
        }
    }

    /// Build the configured backend and open the vault on it.
    pub fn from_config(config: &KeylockerConfig, passphrase: &SecretString) -> anyhow::Result<Self> {
        let backend = build_backend(&config.backend).context("building blob backend")?;
        Self::from_config_with_backend(config, backend, passphrase)
    }

    /// Like [`Vault::from_config`], on a caller-supplied backend.
    pub fn from_config_with_backend(
        config: &KeylockerConfig,
        backend: Arc<dyn BlobBackend>,
        passphrase: &SecretString,
    ) -> anyhow::Result<Self> {
        let key = derive_key_from_config(&config.crypto, passphrase)
            .context("deriving vault key")?;
        Ok(Self::open(config, backend, key))
    }

    /// Open the configured vault with ready key material, e.g. a key from
    /// [`keylocker_crypto::generate_random_key`].
    pub fn open(config: &KeylockerConfig, backend: Arc<dyn BlobBackend>, key: VaultKey) -> Self {
        let inner = ChunkedVault::new(backend, key, config.vault.blob_prefix())
            .with_probe_limit(config.vault.probe_limit);

        tracing::debug!(
            app = %config.vault.app_name,
            backend = %inner.backend().describe(),
            probe_limit = inner.probe_limit(),
            "vault opened"
        );

        Vault {
            inner,
            crypto: config.crypto.clone(),
        }
    }

    pub fn put(&self, name: &str, record: &SecretRecord) -> VaultResult<()> {
        self.inner.put(name, record)
    }

    /// `Ok(None)` when no credential is stored under `name`.
    pub fn get(&self, name: &str) -> VaultResult<Option<SecretRecord>> {
        match self.inner.get(name) {
            Ok(record) => Ok(Some(record)),
            Err(VaultError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn delete(&self, name: &str) -> VaultResult<()> {
        self.inner.delete(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    /// A single field of the stored record, `None` if either is absent.
    pub fn get_property(&self, name: &str, field: &str) -> VaultResult<Option<Value>> {
        Ok(self.get(name)?.and_then(|mut record| record.remove(field)))
    }

    /// Read-modify-write of one field. A missing credential starts as an
    /// empty record; a corrupted one is an error and is left untouched.
    pub fn set_field(&self, name: &str, field: &str, value: Value) -> VaultResult<()> {
        let mut record = self.get(name)?.unwrap_or_default();
        record.insert(field.to_string(), value);
        self.put(name, &record)
    }

    /// The same vault opened under a different passphrase, derived with this
    /// vault's KDF settings.
    pub fn rekeyed(&self, passphrase: &SecretString) -> VaultResult<Vault> {
        let key = derive_key_from_config(&self.crypto, passphrase)?;
        Ok(self.with_vault_key(key))
    }

    pub fn with_vault_key(&self, key: VaultKey) -> Vault {
        Vault {
            inner: self.inner.with_key(key),
            crypto: self.crypto.clone(),
        }
    }

    pub fn chunked(&self) -> &ChunkedVault {
        &self.inner
    }
}
