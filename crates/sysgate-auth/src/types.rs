//! Core types for authentication.
//!
//! - [`Role`]: the access tier of a caller
//! - [`ReadOnlyKeyRecord`]: a stored, hashed read-only API key
//! - [`AuthConfig`]: the persisted `[auth]` section

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access tier of a caller, strictly ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Role {
    /// Not authenticated.
    #[default]
    None,
    /// Holds a valid read-only API key.
    ReadOnly,
    /// Holds a valid admin session token.
    Admin,
}

impl Role {
    /// Returns true if this role may read logs.
    #[must_use]
    pub const fn can_read(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns true if this role may administer the service.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ReadOnly => write!(f, "read_only"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A named read-only API key. Only the SHA-256 hex digest is stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOnlyKeyRecord {
    /// Unique display label.
    pub name: String,
    /// SHA-256 hex digest of the plaintext key.
    pub key_hash: String,
}

impl fmt::Debug for ReadOnlyKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyKeyRecord")
            .field("name", &self.name)
            .field("key_hash", &"[REDACTED]")
            .finish()
    }
}

/// The `[auth]` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Self-describing adaptive hash of the admin password.
    pub admin_password_hash: String,
    /// Read-only API keys.
    pub read_only_keys: Vec<ReadOnlyKeyRecord>,
}
