//! In-memory blob store.
//!
//! Enforces the same size ceiling a real credential store would, so chunking
//! behaviour is observable in tests. The inspection helpers (`blob_names`,
//! `raw`, `corrupt`, `remove_raw`) exist for out-of-band manipulation in tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use keylocker_core::BackendError;

use crate::{check_size, BlobBackend};

/// Default ceiling, matching the vault's default `max_blob_size`.
pub const DEFAULT_MAX_BLOB_SIZE: usize = 1024;

pub struct MemoryBackend {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    max_blob_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_max_blob_size(DEFAULT_MAX_BLOB_SIZE)
    }

    pub fn with_max_blob_size(max_blob_size: usize) -> Self {
        MemoryBackend {
            blobs: Mutex::new(BTreeMap::new()),
            max_blob_size,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, BackendError> {
        self.blobs
            .lock()
            .map_err(|_| BackendError::Unavailable("memory backend lock poisoned".into()))
    }

    /// All blob names currently stored, in sorted order.
    pub fn blob_names(&self) -> Vec<String> {
        self.lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored bytes, bypassing any vault logic.
    pub fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().ok().and_then(|map| map.get(name).cloned())
    }

    /// XOR one byte of a stored blob with `mask`. Returns false if the blob or
    /// offset does not exist.
    pub fn corrupt(&self, name: &str, offset: usize, mask: u8) -> bool {
        let Ok(mut map) = self.lock() else {
            return false;
        };
        match map.get_mut(name).and_then(|blob| blob.get_mut(offset)) {
            Some(byte) => {
                *byte ^= mask;
                true
            }
            None => false,
        }
    }

    /// Remove a blob without going through `delete`. Returns whether it existed.
    pub fn remove_raw(&self, name: &str) -> bool {
        self.lock()
            .map(|mut map| map.remove(name).is_some())
            .unwrap_or(false)
    }
}

impl BlobBackend for MemoryBackend {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        check_size(name, data, self.max_blob_size)?;
        self.lock()?.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        match self.lock()?.remove(name) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(name.to_string())),
        }
    }

    fn max_blob_size(&self) -> usize {
        self.max_blob_size
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self.lock()?.contains_key(name))
    }

    fn describe(&self) -> String {
        format!("memory(max={})", self.max_blob_size)
    }
}
