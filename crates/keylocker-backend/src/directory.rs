//! Directory-backed blob store.
//!
//! Each blob is a file named after the blob, with every byte outside
//! `[A-Za-z0-9._-]` percent-encoded. Writes go to a `~tmp` sibling and are
//! renamed into place. On Unix the directory is 0700 and blobs are 0600.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use keylocker_core::BackendError;

use crate::{check_size, BlobBackend};

pub struct DirectoryBackend {
    dir: PathBuf,
    max_blob_size: usize,
}

impl DirectoryBackend {
    /// Open (creating if needed) a blob directory.
    pub fn open(dir: &Path, max_blob_size: usize) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
        Ok(DirectoryBackend {
            dir: dir.to_path_buf(),
            max_blob_size,
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(encode_file_name(name))
    }

    // '~' is always percent-encoded in blob file names, so this never collides
    fn tmp_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}~tmp", encode_file_name(name)))
    }
}

fn encode_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    // "." and ".." are not usable file names
    if out.chars().all(|c| c == '.') {
        out = out.replace('.', "%2E");
    }
    out
}

fn write_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

fn not_found_or_io(name: &str, err: std::io::Error) -> BackendError {
    if err.kind() == ErrorKind::NotFound {
        BackendError::NotFound(name.to_string())
    } else {
        BackendError::Io(err)
    }
}

impl BlobBackend for DirectoryBackend {
    fn write(&self, name: &str, data: &[u8]) -> Result<(), BackendError> {
        check_size(name, data, self.max_blob_size)?;

        let path = self.path_for(name);
        let tmp = self.tmp_path_for(name);

        if let Err(e) = write_then_rename(&tmp, &path, data) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "temp blob not removed");
                }
            }
            return Err(BackendError::Io(e));
        }

        tracing::debug!(blob = name, bytes = data.len(), "stored blob on disk");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        fs::read(self.path_for(name)).map_err(|e| not_found_or_io(name, e))
    }

    fn delete(&self, name: &str) -> Result<(), BackendError> {
        fs::remove_file(self.path_for(name)).map_err(|e| not_found_or_io(name, e))
    }

    fn max_blob_size(&self) -> usize {
        self.max_blob_size
    }

    fn exists(&self, name: &str) -> Result<bool, BackendError> {
        match fs::metadata(self.path_for(name)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("directory({})", self.dir.display())
    }
}
