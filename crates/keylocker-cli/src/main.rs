//! keylocker: encrypted credential vault CLI
//!
//! Commands:
//!   put <name> [--json '{..}'|-] [KEY=VALUE ...]  - store a credential record
//!   get <name> [--field f]                        - print a record (or one field)
//!   delete <name>                                 - remove a credential and its chunks
//!   exists <name>                                 - print whether a credential is stored
//!   set-field <name> <field> <value>              - update one field in place
//!   gen-key                                       - print a fresh random key
//!   config show                                   - display current configuration

mod passphrase;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keylocker_backend::{build_backend, BlobBackend};
use keylocker_core::config::{expand_home, KeylockerConfig};
use keylocker_core::SecretRecord;
use keylocker_vault::{BlobNames, Vault};
use serde_json::Value;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "keylocker",
    version,
    about = "Encrypted credential vault over the platform credential store",
    long_about = "keylocker: store structured secrets encrypted in the OS credential store, \
                  splitting records that exceed the store's per-entry size limit"
)]
struct Cli {
    /// Path to keylocker.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "KEYLOCKER_CONFIG",
        default_value = "~/.config/keylocker/config.toml"
    )]
    config: PathBuf,

    /// Application scope (overrides vault.app_name)
    #[arg(long, short = 'a', env = "KEYLOCKER_APP")]
    app: Option<String>,

    /// Read the passphrase from the first line of this file
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Treat --key-file as a key printed by `gen-key` rather than a passphrase
    #[arg(long, global = true, requires = "key_file")]
    raw_key: bool,

    /// Log level (trace, debug, info, warn, error; overrides log.level)
    #[arg(long, env = "KEYLOCKER_LOG")]
    log: Option<String>,

    /// Log format (overrides log.format)
    #[arg(long, env = "KEYLOCKER_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a credential, replacing any existing record with that name
    ///
    /// Fields come from --json (an object, or `-` to read stdin) and then
    /// KEY=VALUE pairs; values are parsed as JSON and fall back to strings.
    Put {
        name: String,
        #[arg(long)]
        json: Option<String>,
        fields: Vec<String>,
    },

    /// Print a stored credential as JSON
    Get {
        name: String,
        /// Print only this field
        #[arg(long, short = 'f')]
        field: Option<String>,
    },

    /// Delete a credential, including orphaned chunks
    Delete { name: String },

    /// Print whether a credential is stored (does not need the key)
    Exists { name: String },

    /// Set one field of a credential, creating the record if needed
    #[command(name = "set-field")]
    SetField {
        name: String,
        field: String,
        value: String,
    },

    /// Print a new random key suitable for --key-file --raw-key
    #[command(name = "gen-key")]
    GenKey,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let mut config = KeylockerConfig::load(&config_path)?;
    if let Some(app) = &cli.app {
        config.vault.app_name = app.clone();
    }

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None if config.log.format.eq_ignore_ascii_case("json") => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        app = %config.vault.app_name,
        "keylocker starting"
    );

    match &cli.command {
        Commands::Put { name, json, fields } => {
            let record = build_record(json.as_deref(), fields)?;
            open_vault(&cli, &config)?
                .put(name, &record)
                .with_context(|| format!("storing '{name}'"))?;
            eprintln!("stored '{name}'");
            Ok(())
        }
        Commands::Get { name, field } => cmd_get(&open_vault(&cli, &config)?, name, field.as_deref()),
        Commands::Delete { name } => {
            open_vault(&cli, &config)?
                .delete(name)
                .with_context(|| format!("deleting '{name}'"))?;
            eprintln!("deleted '{name}'");
            Ok(())
        }
        Commands::Exists { name } => cmd_exists(&config, name),
        Commands::SetField { name, field, value } => {
            open_vault(&cli, &config)?
                .set_field(name, field, parse_value(value))
                .with_context(|| format!("updating '{name}'"))
        }
        Commands::GenKey => {
            println!("{}", keylocker_crypto::generate_random_key());
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_vault(cli: &Cli, config: &KeylockerConfig) -> Result<Vault> {
    let backend = build_backend(&config.backend).context("building blob backend")?;
    let key = passphrase::resolve_key(&config.crypto, cli.key_file.as_deref(), cli.raw_key)?;
    Ok(Vault::open(config, backend, key))
}

// ── `keylocker get` ────────────────────────────────────────────────────────────

fn cmd_get(vault: &Vault, name: &str, field: Option<&str>) -> Result<()> {
    let record = vault
        .get(name)
        .with_context(|| format!("reading '{name}'"))?
        .with_context(|| format!("no credential named '{name}'"))?;

    let rendered = match field {
        Some(field) => {
            let value = record
                .get(field)
                .with_context(|| format!("'{name}' has no field '{field}'"))?;
            match value {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other)?,
            }
        }
        None => serde_json::to_string_pretty(&record)?,
    };
    println!("{rendered}");
    Ok(())
}

// ── `keylocker exists` ─────────────────────────────────────────────────────────

fn cmd_exists(config: &KeylockerConfig, name: &str) -> Result<()> {
    let backend = build_backend(&config.backend).context("building blob backend")?;
    let names = BlobNames::new(&config.vault.blob_prefix(), name);
    let present = backend
        .exists(&names.metadata)
        .with_context(|| format!("checking '{name}'"))?;
    println!("{present}");
    Ok(())
}

// ── `keylocker config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &KeylockerConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Record construction ────────────────────────────────────────────────────────

/// JSON if it parses, otherwise the literal string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn build_record(json: Option<&str>, fields: &[String]) -> Result<SecretRecord> {
    let mut record = match json {
        Some("-") => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading record from stdin")?;
            parse_object(&input)?
        }
        Some(text) => parse_object(text)?,
        None => SecretRecord::new(),
    };

    for pair in fields {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got '{pair}'"))?;
        if key.is_empty() {
            anyhow::bail!("empty field name in '{pair}'");
        }
        record.insert(key.to_string(), parse_value(value));
    }
    Ok(record)
}

fn parse_object(text: &str) -> Result<SecretRecord> {
    match serde_json::from_str::<Value>(text).context("parsing --json")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("--json must be an object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_parses_put() {
        let cli = Cli::try_parse_from([
            "keylocker", "put", "github", "user=octo", "id=42", "--json", r#"{"a":1}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Put { name, json, fields } => {
                assert_eq!(name, "github");
                assert_eq!(json.as_deref(), Some(r#"{"a":1}"#));
                assert_eq!(fields, vec!["user=octo", "id=42"]);
            }
            other => panic!("expected Put, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_key_requires_key_file() {
        assert!(Cli::try_parse_from(["keylocker", "--raw-key", "gen-key"]).is_err());
        assert!(Cli::try_parse_from(["keylocker", "get", "x", "--key-file", "k", "--raw-key"]).is_ok());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value(r#"{"n":1}"#), json!({"n": 1}));
        assert_eq!(parse_value("hunter2"), json!("hunter2"));
        assert_eq!(parse_value(""), json!(""));
    }

    #[test]
    fn test_build_record_pairs_override_json() {
        let record = build_record(
            Some(r#"{"user":"a","token":"old"}"#),
            &["token=new".to_string(), "n=3".to_string()],
        )
        .unwrap();
        assert_eq!(Value::Object(record), json!({"user": "a", "token": "new", "n": 3}));
    }

    #[test]
    fn test_build_record_value_may_contain_equals() {
        let record = build_record(None, &["q=a=b".to_string()]).unwrap();
        assert_eq!(record.get("q"), Some(&json!("a=b")));
    }

    #[test]
    fn test_build_record_rejects_bad_input() {
        assert!(build_record(Some("[1,2]"), &[]).is_err());
        assert!(build_record(None, &["novalue".to_string()]).is_err());
        assert!(build_record(None, &["=x".to_string()]).is_err());
    }

    #[test]
    fn test_empty_record_allowed() {
        assert!(build_record(None, &[]).unwrap().is_empty());
    }
}
