//! TOML configuration.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [database]
//! host = "localhost"
//! name = "Syslog"
//! user = "rsyslog"
//! password = "enc:..."
//!
//! [auth]
//! admin_password_hash = "$argon2id$..."
//!
//! [[auth.read_only_keys]]
//! name = "grafana"
//! key_hash = "..."
//!
//! [cleanup]
//! enabled = false
//! ```

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use sysgate_auth::AuthConfig;
use sysgate_secrets::SecretCodec;
use thiserror::Error;
use tracing::debug;

/// Production config location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sysgate/config.toml";

/// Environment variable overriding the config location.
pub const CONFIG_PATH_ENV: &str = "SYSGATE_CONFIG";

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("config file not found: {}", path.display())]
    NotFound {
        /// The path that was tried.
        path: PathBuf,
    },

    /// Reading or writing failed.
    #[error("config io error at {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// Serialization failed.
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A value is missing or out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },

    /// The stored database password could not be decrypted.
    #[error("database password: {0}")]
    Secret(#[from] sysgate_secrets::Error),
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Suggested UI refresh period, in seconds.
    pub auto_refresh_interval: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["*".to_string()],
            auto_refresh_interval: 30,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{}]:{}", self.host, self.port).parse::<SocketAddr>())
            .map_err(|_| ConfigError::Invalid {
                reason: format!("server.host is not an IP address: {}", self.host),
            })
    }
}

/// `[database]` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Schema name.
    pub name: String,
    /// Login user.
    pub user: String,
    /// Plaintext or `enc:`-prefixed password.
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            name: "Syslog".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl DatabaseConfig {
    /// Returns the plaintext password.
    pub fn decrypted_password(&self, codec: &SecretCodec) -> Result<String, ConfigError> {
        Ok(codec.decrypt(&self.password)?)
    }

    /// Builds MySQL connect options with the decrypted password.
    pub fn connect_options(&self, codec: &SecretCodec) -> Result<MySqlConnectOptions, ConfigError> {
        let password = self.decrypted_password(codec)?;
        Ok(MySqlConnectOptions::new()
            .host(&self.host)
            .port(if self.port == 0 { 3306 } else { self.port })
            .username(&self.user)
            .password(&password)
            .database(&self.name))
    }
}

/// `[cleanup]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether the retention loop runs.
    pub enabled: bool,
    /// Mount point whose usage is measured.
    pub disk_path: PathBuf,
    /// Usage above which old rows are deleted.
    pub threshold_percent: f64,
    /// Rows deleted per round.
    pub batch_size: u32,
    /// Seconds between checks.
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            disk_path: PathBuf::from("/var/lib/mysql"),
            threshold_percent: 85.0,
            batch_size: 1000,
            interval_secs: 15 * 60,
        }
    }
}

impl CleanupConfig {
    /// Check period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// The whole `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP settings.
    pub server: ServerConfig,
    /// Database connection.
    pub database: DatabaseConfig,
    /// Admin hash and read-only keys.
    pub auth: AuthConfig,
    /// Disk-usage retention.
    pub cleanup: CleanupConfig,
}

impl AppConfig {
    /// Parses and validates TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let config = Self::from_toml(&text, path)?;
        debug!(path = %path.display(), keys = config.auth.read_only_keys.len(), "loaded config");
        Ok(config)
    }

    /// Checks required fields and ranges.
    ///
    /// An empty admin hash is allowed; it can be set later from localhost.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database.host", &self.database.host),
            ("database.name", &self.database.name),
            ("database.user", &self.database.user),
            ("database.password", &self.database.password),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                reason: format!("{name} is required"),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                reason: "server.port must be between 1 and 65535".to_string(),
            });
        }
        let threshold = self.cleanup.threshold_percent;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::Invalid {
                reason: "cleanup.threshold_percent must be in (0, 100]".to_string(),
            });
        }
        if self.cleanup.enabled && (self.cleanup.batch_size == 0 || self.cleanup.interval_secs == 0) {
            return Err(ConfigError::Invalid {
                reason: "cleanup.batch_size and cleanup.interval_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Writes the config as TOML, replacing the file atomically.
    ///
    /// The file is created with mode 0640 on Unix since it holds secrets.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }

        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, text).map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o640)).map_err(io_err)?;
        }
        std::fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgate_auth::ReadOnlyKeyRecord;
    use sysgate_secrets::StaticIdentity;
    use test_case::test_case;

    const MINIMAL: &str = r#"
[database]
user = "rsyslog"
password = "secret"
"#;

    fn minimal() -> AppConfig {
        AppConfig::from_toml(MINIMAL, Path::new("test.toml")).expect("valid")
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = minimal();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.name, "Syslog");
        assert!(!config.cleanup.enabled);
        assert_eq!(config.cleanup.interval(), Duration::from_secs(900));
        assert!(config.auth.admin_password_hash.is_empty());
    }

    #[test]
    fn bind_addr_handles_ipv6() {
        let mut config = ServerConfig::default();
        assert_eq!(config.bind_addr().expect("v4").port(), 8000);
        config.host = "::1".to_string();
        assert!(config.bind_addr().expect("v6").ip().is_loopback());
        config.host = "example.com".to_string();
        assert!(config.bind_addr().is_err());
    }

    #[test_case("[database]\nuser = \"u\"\n", "database.password is required" ; "missing password")]
    #[test_case("[database]\npassword = \"p\"\n", "database.user is required" ; "missing user")]
    #[test_case("[database]\nuser = \"u\"\npassword = \"p\"\n[server]\nport = 0\n", "server.port must be between 1 and 65535" ; "port zero")]
    #[test_case("[database]\nuser = \"u\"\npassword = \"p\"\n[cleanup]\nthreshold_percent = 0.0\n", "cleanup.threshold_percent must be in (0, 100]" ; "threshold zero")]
    #[test_case("[database]\nuser = \"u\"\npassword = \"p\"\n[cleanup]\nthreshold_percent = 100.5\n", "cleanup.threshold_percent must be in (0, 100]" ; "threshold over")]
    fn validation_rejects(text: &str, reason: &str) {
        let err = AppConfig::from_toml(text, Path::new("x.toml")).expect_err("invalid");
        assert!(
            matches!(err, ConfigError::Invalid { reason: ref got } if got == reason),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AppConfig::from_toml("[server\nport = ", Path::new("x.toml")).expect_err("parse");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn save_then_load_preserves_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = minimal();
        config.auth.admin_password_hash = "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".to_string();
        config.auth.read_only_keys.push(ReadOnlyKeyRecord {
            name: "grafana".to_string(),
            key_hash: "ab".repeat(32),
        });
        config.save(&path).expect("save");

        let loaded = AppConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
        assert!(!path.with_extension("toml.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o640);
        }
    }

    #[test]
    fn encrypted_password_is_decrypted_for_connect() {
        let codec = SecretCodec::from_provider(&StaticIdentity::new("host-a")).expect("codec");
        let mut config = minimal();
        config.database.password = codec.encrypt("hunter2").expect("encrypt");

        assert_eq!(config.database.decrypted_password(&codec).expect("decrypt"), "hunter2");
        assert!(config.database.connect_options(&codec).is_ok());

        let other = SecretCodec::from_provider(&StaticIdentity::new("host-b")).expect("codec");
        assert!(matches!(
            config.database.connect_options(&other),
            Err(ConfigError::Secret(_))
        ));
    }

    #[test]
    fn debug_redacts_database_password() {
        let config = minimal();
        let debug = format!("{:?}", config.database);
        assert!(!debug.contains("secret"));
    }
}
