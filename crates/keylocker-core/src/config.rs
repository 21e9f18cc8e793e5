use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration (loaded from keylocker.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeylockerConfig {
    pub vault: VaultConfig,
    pub backend: BackendConfig,
    pub crypto: CryptoConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Application scope; blob names are prefixed with `keylocker.<app_name>`
    pub app_name: String,
    /// Chunk indices probed when deleting a credential whose metadata is unreadable
    pub probe_limit: usize,
}

impl VaultConfig {
    pub fn blob_prefix(&self) -> String {
        format!("keylocker.{}", self.app_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform credential store (Credential Manager, Keychain, Secret Service)
    Keyring,
    /// One file per blob under `backend.directory`
    Directory,
    /// Process-local, non-persistent
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Keyring service name
    pub service: String,
    /// Blob directory for the directory backend
    pub directory: PathBuf,
    /// Maximum blob size in bytes; larger payloads are split into chunks
    pub max_blob_size: usize,
    /// Retries for transient backend failures (0 = no retry wrapper)
    pub max_retries: u32,
    /// Backoff between retries, multiplied by the attempt number
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    /// Unsalted SHA-256 digest of the passphrase
    Sha256,
    /// Argon2id with a caller-supplied salt (`crypto.kdf_salt`)
    Argon2id,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub kdf: KdfKind,
    /// Base64-encoded 16-byte salt, required when `kdf = "argon2id"`
    pub kdf_salt: Option<String>,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            app_name: "default".into(),
            probe_limit: 20,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Keyring,
            service: "keylocker".into(),
            directory: PathBuf::from("~/.local/share/keylocker/blobs"),
            max_blob_size: 1024,
            max_retries: 0,
            retry_backoff_ms: 50,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: KdfKind::Sha256,
            kdf_salt: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl KeylockerConfig {
    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.backend.max_blob_size == 0 {
            anyhow::bail!("backend.max_blob_size must be greater than zero");
        }
        if self.crypto.kdf == KdfKind::Argon2id && self.crypto.kdf_salt.is_none() {
            anyhow::bail!("crypto.kdf = \"argon2id\" requires crypto.kdf_salt");
        }
        Ok(())
    }
}

/// Expand a leading `~/` using `$HOME`. Other paths are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
