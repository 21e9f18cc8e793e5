//! Chunked, encrypted credential layout over a size-limited blob backend.
//!
//! Single-blob layout (encoded payload fits in `S` bytes):
//! ```text
//! <p>.<name>           base64(nonce ‖ ciphertext ‖ tag)
//! <p>.<name>.metadata  base64(encrypt({"chunks":0,"totalLength":L}))
//! ```
//! Chunked layout (`L > S`):
//! ```text
//! <p>.<name>.metadata  base64(encrypt({"chunks":N,"totalLength":L}))
//! <p>.<name>.chunk.i   bytes [i*S, min((i+1)*S, L)) of the encoded payload
//! ```
//!
//! Write order: primary before metadata for single blobs, metadata before
//! chunks when splitting. A failed write is not rolled back.
//!
//! Concurrent writers to the same name are not serialized here; two `put`
//! calls may interleave their chunk writes and a concurrent `get` may see a
//! mix of old and new chunks (it then fails authentication rather than
//! returning mixed plaintext). Callers needing strict consistency must
//! serialize writers per name themselves.

use std::sync::Arc;

use keylocker_backend::BlobBackend;
use keylocker_core::{BackendError, ChunkMetadata, SecretRecord, VaultError, VaultResult};
use keylocker_crypto::{decrypt_from_base64, encrypt_to_base64, VaultKey};

use crate::names::BlobNames;

/// Chunk indices probed by `delete` when metadata cannot be read.
pub const DEFAULT_PROBE_LIMIT: usize = 20;

/// Split an encoded payload into consecutive slices of at most `max` bytes.
///
/// `max` must be non-zero. The encoded form is ASCII, so bytes and
/// characters coincide.
pub fn partition(encoded: &[u8], max: usize) -> Vec<&[u8]> {
    encoded.chunks(max).collect()
}

#[derive(Clone)]
pub struct ChunkedVault {
    backend: Arc<dyn BlobBackend>,
    key: VaultKey,
    prefix: String,
    probe_limit: usize,
}

impl std::fmt::Debug for ChunkedVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedVault")
            .field("backend", &self.backend.describe())
            .field("prefix", &self.prefix)
            .field("probe_limit", &self.probe_limit)
            .finish_non_exhaustive()
    }
}

impl ChunkedVault {
    pub fn new(backend: Arc<dyn BlobBackend>, key: VaultKey, prefix: impl Into<String>) -> Self {
        ChunkedVault {
            backend,
            key,
            prefix: prefix.into(),
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }

    pub fn with_probe_limit(mut self, probe_limit: usize) -> Self {
        self.probe_limit = probe_limit;
        self
    }

    /// Same backend and prefix under a different key.
    pub fn with_key(&self, key: VaultKey) -> Self {
        ChunkedVault {
            backend: Arc::clone(&self.backend),
            key,
            prefix: self.prefix.clone(),
            probe_limit: self.probe_limit,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn probe_limit(&self) -> usize {
        self.probe_limit
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    pub fn names(&self, name: &str) -> BlobNames {
        BlobNames::new(&self.prefix, name)
    }

    /// Encrypt `record` and store it under `name`, replacing any previous value.
    pub fn put(&self, name: &str, record: &SecretRecord) -> VaultResult<()> {
        let names = self.names(name);
        let max = self.backend.max_blob_size();
        if max == 0 {
            return Err(BackendError::TooLarge {
                name: names.primary,
                size: 1,
                max,
            }
            .into());
        }

        // Only used to clean up blobs the new layout no longer covers.
        let previous = match self.read_metadata(name, &names) {
            Ok(meta) => PriorLayout::Known(meta),
            Err(VaultError::NotFound(_)) => PriorLayout::Absent,
            Err(_) => PriorLayout::Unreadable,
        };

        let plaintext = serde_json::to_vec(record)
            .map_err(|e| VaultError::CorruptedData(format!("record serialization: {e}")))?;
        let encoded = encrypt_to_base64(&self.key, &plaintext)?;
        let total_length = encoded.len() as u64;

        let layout = if encoded.len() <= max {
            self.backend.write(&names.primary, encoded.as_bytes())?;
            let meta = ChunkMetadata::single(total_length);
            self.write_metadata(&names, &meta)?;
            meta
        } else {
            let chunks = partition(encoded.as_bytes(), max);
            let count = u32::try_from(chunks.len()).map_err(|_| BackendError::TooLarge {
                name: names.primary.clone(),
                size: encoded.len(),
                max,
            })?;
            let meta = ChunkMetadata::chunked(count, total_length);
            self.write_metadata(&names, &meta)?;
            for (index, chunk) in chunks.iter().enumerate() {
                self.backend.write(&names.chunk(index), chunk)?;
            }
            meta
        };

        tracing::debug!(
            credential = name,
            chunks = layout.chunks,
            encoded_len = total_length,
            "stored credential"
        );

        self.remove_stale(name, &names, &previous, &layout);
        Ok(())
    }

    /// Read and decrypt the record stored under `name`.
    pub fn get(&self, name: &str) -> VaultResult<SecretRecord> {
        let names = self.names(name);
        let meta = self.read_metadata(name, &names)?;

        let encoded = if meta.is_chunked() {
            let bound = (meta.chunks as usize).saturating_mul(self.backend.max_blob_size());
            let mut combined = Vec::with_capacity((meta.total_length as usize).min(bound));
            for index in 0..meta.chunks as usize {
                combined.extend_from_slice(&self.read_blob(name, &names.chunk(index))?);
            }
            combined
        } else {
            self.read_blob(name, &names.primary)?
        };

        if encoded.len() as u64 != meta.total_length {
            return Err(VaultError::CorruptedData(format!(
                "'{name}': reassembled payload length does not match metadata"
            )));
        }

        let record = self.open_record(name, &encoded)?;
        tracing::debug!(credential = name, chunks = meta.chunks, "loaded credential");
        Ok(record)
    }

    /// Remove every blob belonging to `name`. Missing blobs are not an error.
    ///
    /// When metadata is missing or unreadable, chunk indices `0..probe_limit`
    /// are probed instead; chunks beyond the bound are left behind. A backend
    /// failure reading metadata is returned after that cleanup.
    pub fn delete(&self, name: &str) -> VaultResult<()> {
        let names = self.names(name);
        let mut first_err: Option<BackendError> = None;

        match self.read_metadata(name, &names) {
            Ok(meta) => {
                for index in 0..meta.chunks as usize {
                    self.remove_blob(&names.chunk(index), &mut first_err);
                }
            }
            Err(VaultError::NotFound(_)) => {
                tracing::debug!(credential = name, "no metadata, probing for orphaned chunks");
                self.sweep_chunks(name, &names, 0, &mut first_err);
            }
            Err(VaultError::BackendFailure(e)) => {
                // Clean up what we can, but the caller still sees the failure.
                tracing::warn!(
                    credential = name,
                    error = %e,
                    probe_limit = self.probe_limit,
                    "metadata read failed, probing for chunks"
                );
                first_err = Some(e);
                self.sweep_chunks(name, &names, 0, &mut first_err);
            }
            Err(e) => {
                tracing::warn!(
                    credential = name,
                    error = %e,
                    probe_limit = self.probe_limit,
                    "metadata unreadable, probing for chunks"
                );
                self.sweep_chunks(name, &names, 0, &mut first_err);
            }
        }

        self.remove_blob(&names.primary, &mut first_err);
        self.remove_blob(&names.metadata, &mut first_err);

        match first_err {
            Some(e) => Err(e.into()),
            None => {
                tracing::debug!(credential = name, "deleted credential");
                Ok(())
            }
        }
    }

    /// True iff the metadata blob for `name` is present. Does not decrypt it.
    pub fn exists(&self, name: &str) -> bool {
        let names = self.names(name);
        match self.backend.exists(&names.metadata) {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(credential = name, error = %e, "existence check failed");
                false
            }
        }
    }

    /// Read and decrypt the metadata blob.
    pub fn metadata(&self, name: &str) -> VaultResult<ChunkMetadata> {
        self.read_metadata(name, &self.names(name))
    }

    fn read_metadata(&self, name: &str, names: &BlobNames) -> VaultResult<ChunkMetadata> {
        let raw = self.read_blob(name, &names.metadata)?;
        let plaintext = self.open(name, &raw)?;
        ChunkMetadata::from_bytes(&plaintext)
            .map_err(|e| VaultError::CorruptedData(format!("'{name}': metadata: {e}")))
    }

    fn write_metadata(&self, names: &BlobNames, meta: &ChunkMetadata) -> VaultResult<()> {
        let plaintext = meta
            .to_bytes()
            .map_err(|e| VaultError::CorruptedData(format!("metadata serialization: {e}")))?;
        let encoded = encrypt_to_base64(&self.key, &plaintext)?;
        self.backend.write(&names.metadata, encoded.as_bytes())?;
        Ok(())
    }

    fn read_blob(&self, name: &str, blob: &str) -> VaultResult<Vec<u8>> {
        self.backend.read(blob).map_err(|e| match e {
            BackendError::NotFound(_) => VaultError::NotFound(name.to_string()),
            other => VaultError::BackendFailure(other),
        })
    }

    fn open(&self, name: &str, encoded: &[u8]) -> VaultResult<Vec<u8>> {
        let text = std::str::from_utf8(encoded)
            .map_err(|_| VaultError::CorruptedData(format!("'{name}': failed authentication")))?;
        decrypt_from_base64(&self.key, text)
            .map_err(|_| VaultError::CorruptedData(format!("'{name}': failed authentication")))
    }

    fn open_record(&self, name: &str, encoded: &[u8]) -> VaultResult<SecretRecord> {
        let plaintext = self.open(name, encoded)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::CorruptedData(format!("'{name}': record: {e}")))
    }

    /// Delete `blob`, treating absence as success. Returns true if a blob was removed.
    fn remove_blob(&self, blob: &str, first_err: &mut Option<BackendError>) -> bool {
        match self.backend.delete(blob) {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                tracing::warn!(blob, error = %e, "blob delete failed");
                first_err.get_or_insert(e);
                false
            }
        }
    }

    /// Delete chunk indices `start..probe_limit` that exist. Returns how many were removed.
    fn sweep_chunks(
        &self,
        name: &str,
        names: &BlobNames,
        start: usize,
        first_err: &mut Option<BackendError>,
    ) -> usize {
        let removed = (start..self.probe_limit)
            .filter(|&index| self.remove_blob(&names.chunk(index), first_err))
            .count();
        if removed > 0 {
            tracing::info!(credential = name, removed, "removed orphaned chunks");
        }
        removed
    }

    /// Best-effort removal of blobs from the previous layout that `current` does not use.
    ///
    /// When the previous metadata could not be read (another key, or corrupted),
    /// chunk indices past the new layout are swept up to `probe_limit`.
    fn remove_stale(
        &self,
        name: &str,
        names: &BlobNames,
        previous: &PriorLayout,
        current: &ChunkMetadata,
    ) {
        let mut ignored = None;
        let primary_stale = match previous {
            PriorLayout::Absent => false,
            PriorLayout::Known(prev) => {
                for index in current.chunks..prev.chunks {
                    self.remove_blob(&names.chunk(index as usize), &mut ignored);
                }
                !prev.is_chunked()
            }
            PriorLayout::Unreadable => {
                self.sweep_chunks(name, names, current.chunks as usize, &mut ignored);
                true
            }
        };
        if primary_stale && current.is_chunked() {
            self.remove_blob(&names.primary, &mut ignored);
        }
        if let Some(e) = ignored {
            tracing::warn!(credential = name, error = %e, "stale blob cleanup incomplete");
        }
    }
}

/// What `put` found under a name before overwriting it.
enum PriorLayout {
    Absent,
    Known(ChunkMetadata),
    Unreadable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylocker_backend::MemoryBackend;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> SecretRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn vault(max: usize) -> (Arc<MemoryBackend>, ChunkedVault) {
        let backend = Arc::new(MemoryBackend::with_max_blob_size(max));
        let vault = ChunkedVault::new(backend.clone(), VaultKey::from_bytes([7u8; 32]), "t");
        (backend, vault)
    }

    #[test]
    fn test_partition_exact_scenario() {
        let encoded = vec![b'A'; 2600];
        let parts = partition(&encoded, 1024);
        let sizes: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![1024, 1024, 552]);
        assert_eq!(parts.concat(), encoded);
    }

    #[test]
    fn test_partition_boundaries() {
        assert_eq!(partition(&[0u8; 1024], 1024).len(), 1);
        assert_eq!(partition(&[0u8; 1025], 1024).len(), 2);
        assert!(partition(&[], 1024).is_empty());
    }

    #[test]
    fn test_small_record_uses_primary_blob() {
        let (backend, vault) = vault(1024);
        vault.put("api", &record(&[("token", json!("abc"))])).unwrap();

        assert_eq!(backend.blob_names(), vec!["t.api", "t.api.metadata"]);
        assert_eq!(vault.metadata("api").unwrap().chunks, 0);
    }

    #[test]
    fn test_metadata_total_length_matches_primary() {
        let (backend, vault) = vault(1024);
        vault.put("api", &record(&[("token", json!("abc"))])).unwrap();

        let stored = backend.raw("t.api").unwrap();
        assert_eq!(vault.metadata("api").unwrap().total_length, stored.len() as u64);
    }

    #[test]
    fn test_exists_does_not_require_key() {
        let (_backend, vault) = vault(1024);
        vault.put("api", &SecretRecord::new()).unwrap();

        let other = vault.with_key(VaultKey::from_bytes([8u8; 32]));
        assert!(other.exists("api"));
        assert!(matches!(other.get("api"), Err(VaultError::CorruptedData(_))));
    }

    #[test]
    fn test_zero_max_blob_size_rejected() {
        let (_backend, vault) = vault(0);
        assert!(matches!(
            vault.put("x", &SecretRecord::new()),
            Err(VaultError::BackendFailure(BackendError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_oversized_total_length_is_corrupted() {
        let (backend, vault) = vault(1024);
        let names = vault.names("api");
        vault
            .write_metadata(&names, &ChunkMetadata::chunked(1, u64::MAX))
            .unwrap();
        backend.write(&names.chunk(0), b"abc").unwrap();

        assert!(matches!(vault.get("api"), Err(VaultError::CorruptedData(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let (_backend, vault) = vault(1024);
        let rendered = format!("{vault:?}");
        assert!(rendered.contains("memory(max=1024)"));
        assert!(!rendered.contains("key"));
    }
}
