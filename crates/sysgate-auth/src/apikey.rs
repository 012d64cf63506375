//! Read-only API key generation and hashing.
//!
//! - [`ApiKeySecret`]: the plaintext key, shown once and zeroized on drop
//! - [`hash_key`]: SHA-256 hex digest stored in configuration
//! - [`generate_read_only_key`]: mint a key and its digest

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Number of random bytes in a key or session token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of a hex-encoded SHA-256 digest.
pub const KEY_HASH_HEX_LENGTH: usize = 64;

/// Returns `len` bytes of OS randomness, hex-encoded.
pub(crate) fn random_hex(len: usize) -> Result<String> {
    let mut raw = vec![0u8; len];
    OsRng.try_fill_bytes(&mut raw).map_err(|e| Error::Randomness {
        reason: format!("failed to read random bytes: {e}"),
    })?;
    let encoded = hex::encode(&raw);
    raw.zeroize();
    Ok(encoded)
}

/// The plaintext API key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKeySecret {
    key: String,
}

impl ApiKeySecret {
    /// Generates a new random key: 256 bits of randomness, hex-encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source fails.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: random_hex(TOKEN_BYTES)?,
        })
    }

    /// Returns the plaintext key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.key
    }

    /// Returns the SHA-256 hex digest of this key.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_key(&self.key)
    }
}

impl fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the key in debug output
        f.debug_struct("ApiKeySecret")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Returns the hex-encoded SHA-256 digest of `key`.
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Compares two stored digests in constant time.
#[must_use]
pub fn hashes_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// Generates a new read-only key, returning the plaintext and its digest.
///
/// The plaintext must be shown to the caller once; it cannot be recovered.
///
/// # Errors
///
/// Returns an error if the random source fails.
pub fn generate_read_only_key() -> Result<(ApiKeySecret, String)> {
    let secret = ApiKeySecret::generate()?;
    let hash = secret.hash();
    Ok((secret, hash))
}
