//! Command-line argument parsing with clap.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sysgate_auth::{ReadOnlyKeyRecord, generate_read_only_key, hash_admin_password};
use sysgate_secrets::SecretCodec;

use crate::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};

/// sysgate - authenticated HTTP access to rsyslog's MySQL store.
#[derive(Parser, Debug, Clone)]
#[command(name = "sysgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Configuration file.
        #[arg(short, long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Print the admin password hash for `[auth] admin_password_hash`.
    HashPassword {
        /// Plaintext password.
        password: String,
    },

    /// Encrypt a value for this host, e.g. `[database] password`.
    EncryptSecret {
        /// Plaintext value.
        plaintext: String,
    },

    /// Create a read-only API key and print its config stanza.
    GenerateKey {
        /// Key name.
        name: String,
    },
}

#[derive(Serialize)]
struct KeyStanza {
    auth: KeyList,
}

#[derive(Serialize)]
struct KeyList {
    read_only_keys: Vec<ReadOnlyKeyRecord>,
}

/// Writes the hash of `password`.
pub fn write_password_hash(password: &str, out: &mut impl Write) -> anyhow::Result<()> {
    if password.is_empty() {
        bail!("password must not be empty");
    }
    let hash = hash_admin_password(password).context("failed to hash password")?;
    writeln!(out, "{hash}")?;
    Ok(())
}

/// Writes `plaintext` encrypted with `codec`.
pub fn write_encrypted_secret(
    codec: &SecretCodec,
    plaintext: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let value = codec.encrypt(plaintext).context("failed to encrypt value")?;
    writeln!(out, "{value}")?;
    Ok(())
}

/// Writes a new key and the TOML stanza that registers it.
pub fn write_generated_key(name: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("key name must not be empty");
    }
    let (secret, key_hash) = generate_read_only_key().context("failed to generate key")?;
    let stanza = toml::to_string(&KeyStanza {
        auth: KeyList {
            read_only_keys: vec![ReadOnlyKeyRecord {
                name: name.to_string(),
                key_hash,
            }],
        },
    })?;

    writeln!(out, "# API key for '{name}' (shown once): {}", secret.expose())?;
    writeln!(out, "{stanza}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgate_auth::{AuthConfig, CredentialManager};
    use sysgate_secrets::StaticIdentity;

    #[test]
    fn serve_accepts_config_path() {
        let cli = Cli::try_parse_from(["sysgate", "serve", "--config", "/tmp/x.toml"])
            .expect("parse args");
        assert!(matches!(
            cli.command,
            Commands::Serve { ref config } if config == &PathBuf::from("/tmp/x.toml")
        ));
    }

    #[test]
    fn log_json_is_global() {
        let cli = Cli::try_parse_from(["sysgate", "generate-key", "grafana", "--log-json"])
            .expect("parse args");
        assert!(cli.log_json);
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["sysgate"]).is_err());
    }

    #[test]
    fn encrypted_secret_decrypts_on_same_host() {
        let codec = SecretCodec::from_provider(&StaticIdentity::new("host-a")).expect("codec");
        let mut out = Vec::new();
        write_encrypted_secret(&codec, "hunter2", &mut out).expect("write secret");

        let line = String::from_utf8(out).expect("utf8");
        assert!(line.starts_with("enc:"));
        assert_eq!(codec.decrypt(line.trim()).expect("decrypt"), "hunter2");
    }

    #[test]
    fn generated_stanza_registers_the_key() {
        let mut out = Vec::new();
        write_generated_key("grafana \"prod\"", &mut out).expect("write key");
        let text = String::from_utf8(out).expect("utf8");

        let key = text
            .lines()
            .next()
            .and_then(|l| l.rsplit(' ').next())
            .expect("key line")
            .to_string();
        #[derive(serde::Deserialize)]
        struct Doc {
            auth: AuthConfig,
        }
        let doc: Doc = toml::from_str(&text).expect("parse stanza");
        assert_eq!(doc.auth.read_only_keys[0].name, "grafana \"prod\"");

        let manager = CredentialManager::new(doc.auth);
        assert_eq!(manager.verify_read_only_key(&key).as_deref(), Some("grafana \"prod\""));
    }

    #[test]
    fn blank_inputs_are_rejected() {
        let mut out = Vec::new();
        assert!(write_generated_key("  ", &mut out).is_err());
        assert!(write_password_hash("", &mut out).is_err());
        assert!(out.is_empty());
    }
}
