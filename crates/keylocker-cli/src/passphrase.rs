//! Key material acquisition: environment, key file, or TTY prompt.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};
use keylocker_core::config::CryptoConfig;
use keylocker_crypto::VaultKey;
use keylocker_vault::derive_key_from_config;
use secrecy::{ExposeSecret, SecretString};

pub const PASSPHRASE_ENV_VAR: &str = "KEYLOCKER_PASSPHRASE";

/// Resolve the vault key.
///
/// Priority:
/// 1. `--key-file` (a passphrase, or with `raw` a `gen-key` output used as-is)
/// 2. `KEYLOCKER_PASSPHRASE`
/// 3. interactive prompt
pub fn resolve_key(crypto: &CryptoConfig, key_file: Option<&Path>, raw: bool) -> Result<VaultKey> {
    if let Some(path) = key_file {
        let secret = read_key_file(path)?;
        if raw {
            return VaultKey::from_base64(secret.expose_secret())
                .with_context(|| format!("key file {} is not a generated key", path.display()));
        }
        return derive_key_from_config(crypto, &secret).context("deriving vault key");
    }
    if raw {
        anyhow::bail!("--raw-key requires --key-file");
    }

    let passphrase = read_passphrase()?;
    derive_key_from_config(crypto, &passphrase).context("deriving vault key")
}

/// First line of the file, without its line ending.
pub fn read_key_file(path: &Path) -> Result<SecretString> {
    let content = SecretString::from(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    let line = content
        .expose_secret()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    if line.is_empty() {
        anyhow::bail!("key file {} is empty", path.display());
    }
    Ok(SecretString::from(line))
}

fn read_passphrase() -> Result<SecretString> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV_VAR) {
        if !value.is_empty() {
            return Ok(SecretString::from(value));
        }
    }

    if std::io::stdin().is_terminal() {
        eprint!("Vault passphrase: ");
        let passphrase = rpassword::read_password().context("reading passphrase")?;
        if passphrase.is_empty() {
            anyhow::bail!("empty passphrase not allowed");
        }
        return Ok(SecretString::from(passphrase));
    }

    anyhow::bail!(
        "no passphrase provided: set {PASSPHRASE_ENV_VAR}, pass --key-file, or run interactively"
    )
}
