//! Host identity providers.
//!
//! The secret codec derives its key from a string that is stable for the
//! lifetime of a host. [`HostIdentity`] reads it from the system; tests use
//! [`StaticIdentity`] so no filesystem access is needed.

use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Well-known system identity file (systemd).
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Secondary system identity file (older dbus installs).
pub const DBUS_MACHINE_ID_PATH: &str = "/var/lib/dbus/machine-id";

/// Default location of the locally generated identity.
pub const DEFAULT_FALLBACK_PATH: &str = "/etc/sysgate/machine-id";

/// Source of a stable host identity string.
pub trait IdentityProvider: Send + Sync {
    /// Returns the host identity.
    ///
    /// # Errors
    ///
    /// Returns an error if no identity can be read or generated.
    fn identity(&self) -> Result<String>;
}

/// A fixed identity, used in tests and for explicit operator overrides.
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    /// Creates a provider that always returns `identity`.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the identity from the system machine-id files, falling back to a
/// generated identity persisted at `fallback_path`.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    candidates: Vec<PathBuf>,
    fallback_path: PathBuf,
}

impl HostIdentity {
    /// Creates a provider with the standard system paths.
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(
            vec![PathBuf::from(MACHINE_ID_PATH), PathBuf::from(DBUS_MACHINE_ID_PATH)],
            DEFAULT_FALLBACK_PATH,
        )
    }

    /// Creates a provider that reads `candidates` in order before the fallback.
    #[must_use]
    pub fn with_paths(candidates: Vec<PathBuf>, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            candidates,
            fallback_path: fallback_path.into(),
        }
    }

    /// Returns the path of the generated fallback identity.
    #[must_use]
    pub fn fallback_path(&self) -> &Path {
        &self.fallback_path
    }
}

impl Default for HostIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for HostIdentity {
    fn identity(&self) -> Result<String> {
        for path in self.candidates.iter().chain(std::iter::once(&self.fallback_path)) {
            if let Some(id) = read_identity_file(path) {
                debug!(path = %path.display(), "using host identity");
                return Ok(id);
            }
        }

        let id = generate_identity()?;
        persist_identity(&self.fallback_path, &id);
        Ok(id)
    }
}

fn read_identity_file(path: &Path) -> Option<String> {
    let data = fs::read_to_string(path).ok()?;
    let trimmed = data.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn generate_identity() -> Result<String> {
    let mut raw = [0u8; 16];
    OsRng.try_fill_bytes(&mut raw).map_err(|e| Error::Identity {
        reason: format!("could not generate machine id: {e}"),
    })?;
    Ok(hex::encode(raw))
}

/// Best-effort write. On failure the identity only lives for this process.
fn persist_identity(path: &Path, id: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!(error = %e, "could not create identity directory; identity is ephemeral");
            return;
        }
    }
    match fs::write(path, format!("{id}\n")) {
        Ok(()) => debug!(path = %path.display(), "generated host identity"),
        Err(e) => warn!(error = %e, "could not persist host identity; identity is ephemeral"),
    }
}
