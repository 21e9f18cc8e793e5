//! Bounded retry wrapper for transient backend failures.
//!
//! Only [`BackendError::Unavailable`] and [`BackendError::Io`] are retried.
//! `NotFound` and `TooLarge` are answers, not failures, and pass straight through.

use std::thread;
use std::time::Duration;

use keylocker_core::BackendError;

use crate::BlobBackend;

pub struct RetryBackend<B> {
    inner: B,
    max_retries: u32,
    backoff: Duration,
}

impl<B: BlobBackend> RetryBackend<B> {
    /// Retry each call up to `max_retries` extra times, sleeping
    /// `backoff * attempt` between attempts.
    pub fn new(inner: B, max_retries: u32, backoff: Duration) -> Self {
        RetryBackend {
            inner,
            max_retries,
            backoff,
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn run<T>(
        &self,
        op: &str,
        name: &str,
        mut f: impl FnMut(&B) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut attempt = 0;
        loop {
            match f(&self.inner) {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        op,
                        blob = name,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "transient backend failure, retrying"
                    );
                    thread::sleep(self.backoff * attempt);
                }
                result => return result,
            }
        }
    }
}

impl<B: BlobBackend> BlobBackend for RetryBackend<B> {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        self.run("write", name, |b| b.write(name, data))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.run("read", name, |b| b.read(name))
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.run("delete", name, |b| b.delete(name))
    }

    fn max_blob_size(&self) -> usize {
        self.inner.max_blob_size()
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        self.run("exists", name, |b| b.exists(name))
    }

    fn describe(&self) -> String {
        format!("retry({}, max={})", self.inner.describe(), self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls of every kind with `Unavailable`.
    struct Flaky {
        inner: MemoryBackend,
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Flaky {
                inner: MemoryBackend::new(),
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn gate(&self) -> Result<(), BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(BackendError::Unavailable("keychain locked".into()))
            } else {
                Ok(())
            }
        }
    }

    impl BlobBackend for Flaky {
        fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
            self.gate()?;
            self.inner.write(name, data)
        }
        fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
            self.gate()?;
            self.inner.read(name)
        }
        fn delete(&self, name: &str) -> Result<(), BackendError> {
            self.gate()?;
            self.inner.delete(name)
        }
        fn max_blob_size(&self) -> usize {
            self.inner.max_blob_size()
        }
        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    #[test]
    fn test_retries_until_success() {
        let backend = RetryBackend::new(Flaky::new(2), 3, Duration::ZERO);
        backend.write("k", b"v").unwrap();
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let backend = RetryBackend::new(Flaky::new(10), 2, Duration::ZERO);
        let err = backend.write("k", b"v").unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let backend = RetryBackend::new(Flaky::new(0), 5, Duration::ZERO);
        assert!(backend.read("missing").unwrap_err().is_not_found());
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_too_large_is_not_retried() {
        let backend = RetryBackend::new(MemoryBackend::with_max_blob_size(1), 5, Duration::ZERO);
        assert!(matches!(
            backend.write("k", b"12"),
            Err(BackendError::TooLarge { .. })
        ));
    }
}
