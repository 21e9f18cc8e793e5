//! End-to-end tests of the `Vault` facade, including configuration-driven
//! construction over the on-disk directory backend.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keylocker_backend::{BlobBackend, DirectoryBackend, MemoryBackend};
use keylocker_core::config::{BackendKind, KdfKind, KeylockerConfig};
use keylocker_crypto::{generate_random_key, VaultKey};
use keylocker_vault::{SecretRecord, Vault, VaultError};
use secrecy::SecretString;
use serde_json::json;

fn passphrase(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn token_record(pad: usize) -> SecretRecord {
    let mut record = SecretRecord::new();
    record.insert("access_token".into(), json!("ya29.".to_string() + &"t".repeat(pad)));
    record.insert("token_type".into(), json!("Bearer"));
    record
}

fn directory_config(dir: &std::path::Path) -> KeylockerConfig {
    let mut config = KeylockerConfig::default();
    config.vault.app_name = "e2e".into();
    config.backend.kind = BackendKind::Directory;
    config.backend.directory = dir.to_path_buf();
    config
}

#[test]
fn facade_roundtrip_and_absence() {
    let vault = Vault::new(Arc::new(MemoryBackend::new()), "app", &passphrase("pw"));

    assert_eq!(vault.get("svc").unwrap(), None);
    vault.put("svc", &token_record(10)).unwrap();
    assert_eq!(vault.get("svc").unwrap(), Some(token_record(10)));
    assert!(vault.exists("svc"));

    vault.delete("svc").unwrap();
    assert_eq!(vault.get("svc").unwrap(), None);
    assert!(!vault.exists("svc"));
}

/// The same passphrase always derives the same key, so a second vault
/// instance reads what the first wrote.
#[test]
fn same_passphrase_reopens_vault() {
    let backend = Arc::new(MemoryBackend::new());
    Vault::new(backend.clone(), "app", &passphrase("pw"))
        .put("svc", &token_record(2000))
        .unwrap();

    let reopened = Vault::new(backend, "app", &passphrase("pw"));
    assert_eq!(reopened.get("svc").unwrap(), Some(token_record(2000)));
}

#[test]
fn wrong_passphrase_is_corrupted_not_absent() {
    let backend = Arc::new(MemoryBackend::new());
    let vault = Vault::new(backend.clone(), "app", &passphrase("right"));
    vault.put("svc", &token_record(10)).unwrap();

    let intruder = Vault::new(backend, "app", &passphrase("wrong"));
    assert!(intruder.exists("svc"));
    assert!(matches!(intruder.get("svc"), Err(VaultError::CorruptedData(_))));
    assert!(matches!(
        intruder.get_property("svc", "token_type"),
        Err(VaultError::CorruptedData(_))
    ));
}

#[test]
fn apps_are_isolated_on_one_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let a = Vault::new(backend.clone(), "alpha", &passphrase("pw"));
    let b = Vault::new(backend.clone(), "beta", &passphrase("pw"));

    a.put("svc", &token_record(1)).unwrap();
    assert!(!b.exists("svc"));
    b.delete("svc").unwrap();
    assert!(a.exists("svc"));
    assert!(backend
        .blob_names()
        .iter()
        .all(|n| n.starts_with("keylocker.alpha.")));
}

#[test]
fn random_key_opens_vault_directly() {
    let backend = Arc::new(MemoryBackend::new());
    let encoded = generate_random_key();

    let vault = Vault::with_key(backend.clone(), "app", VaultKey::from_base64(&encoded).unwrap());
    vault.put("svc", &token_record(5)).unwrap();

    let again = Vault::with_key(backend, "app", VaultKey::from_base64(&encoded).unwrap());
    assert_eq!(again.get("svc").unwrap(), Some(token_record(5)));
}

#[test]
fn set_field_on_chunked_record() {
    let vault = Vault::new(Arc::new(MemoryBackend::new()), "app", &passphrase("pw"));
    vault.put("svc", &token_record(3000)).unwrap();
    assert!(vault.chunked().metadata("svc").unwrap().is_chunked());

    vault.set_field("svc", "refresh_token", json!("r1")).unwrap();

    let record = vault.get("svc").unwrap().unwrap();
    assert_eq!(record.get("refresh_token"), Some(&json!("r1")));
    assert_eq!(record.get("token_type"), Some(&json!("Bearer")));
    let keys: Vec<&str> = record.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["access_token", "token_type", "refresh_token"]);
}

#[test]
fn rekeyed_vault_shares_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let vault = Vault::new(backend, "app", &passphrase("one"));
    let other = vault.rekeyed(&passphrase("two")).unwrap();

    other.put("svc", &token_record(1)).unwrap();
    assert!(vault.exists("svc"));
    assert!(vault.get("svc").is_err());
    assert_eq!(other.get("svc").unwrap(), Some(token_record(1)));
}

#[test]
fn directory_backend_persists_across_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let config = directory_config(&tmp.path().join("blobs"));

    let vault = Vault::from_config(&config, &passphrase("pw")).unwrap();
    vault.put("google/oauth", &token_record(2500)).unwrap();
    drop(vault);

    let reopened = Vault::from_config(&config, &passphrase("pw")).unwrap();
    assert_eq!(
        reopened.get("google/oauth").unwrap(),
        Some(token_record(2500))
    );

    let chunks = reopened.chunked().metadata("google/oauth").unwrap().chunks as usize;
    assert!(chunks > 1);
    let files = std::fs::read_dir(tmp.path().join("blobs")).unwrap().count();
    assert_eq!(files, chunks + 1);

    reopened.delete("google/oauth").unwrap();
    let files = std::fs::read_dir(tmp.path().join("blobs")).unwrap().count();
    assert_eq!(files, 0);
}

#[test]
fn directory_backend_orphan_recovery() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(DirectoryBackend::open(tmp.path(), 1024).unwrap());
    let vault = Vault::new(backend.clone(), "app", &passphrase("pw"));

    vault.put("svc", &token_record(2000)).unwrap();
    backend.delete("keylocker.app.svc.metadata").unwrap();

    assert_eq!(vault.get("svc").unwrap(), None);
    vault.delete("svc").unwrap();
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn argon2id_config_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = directory_config(tmp.path());
    config.crypto.kdf = KdfKind::Argon2id;
    config.crypto.kdf_salt = Some(STANDARD.encode([42u8; 16]));
    config.crypto.argon2_mem_cost_kib = 1024;
    config.crypto.argon2_time_cost = 1;
    config.crypto.argon2_parallelism = 1;

    let vault = Vault::from_config(&config, &passphrase("pw")).unwrap();
    vault.put("svc", &token_record(10)).unwrap();

    let reopened = Vault::from_config(&config, &passphrase("pw")).unwrap();
    assert_eq!(reopened.get("svc").unwrap(), Some(token_record(10)));

    // A SHA-256 key over the same blobs cannot read them.
    let sha = Vault::new(
        Arc::new(DirectoryBackend::open(tmp.path(), 1024).unwrap()),
        "e2e",
        &passphrase("pw"),
    );
    assert!(matches!(sha.get("svc"), Err(VaultError::CorruptedData(_))));
}

#[test]
fn from_config_respects_probe_limit() {
    let mut config = KeylockerConfig::default();
    config.backend.kind = BackendKind::Memory;
    config.vault.probe_limit = 5;

    let vault = Vault::from_config(&config, &passphrase("pw")).unwrap();
    assert_eq!(vault.chunked().probe_limit(), 5);
    assert_eq!(vault.chunked().prefix(), "keylocker.default");
}
