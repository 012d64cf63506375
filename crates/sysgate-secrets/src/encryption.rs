//! Cryptographic primitives for stored secrets.
//!
//! This module provides:
//! - [`SecretKey`]: a 256-bit symmetric key, zeroized on drop
//! - [`encrypt`] / [`decrypt`]: AES-256-GCM with a fresh random nonce per call

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of the encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// A symmetric key for secret encryption.
///
/// The key is securely zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Creates a `SecretKey` from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::Encryption {
                reason: format!("key must be exactly {KEY_SIZE} bytes, got {}", bytes.len()),
            });
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a host identity string and an application salt.
    ///
    /// The key is `SHA-256(identity || salt)`.
    #[must_use]
    pub fn derive(identity: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update(salt.as_bytes());
        Self {
            bytes: hasher.finalize().into(),
        }
    }

    /// Returns the key bytes as a slice.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts plaintext using AES-256-GCM.
///
/// The output format is: `nonce || ciphertext || tag`. No associated data.
///
/// # Errors
///
/// Returns an error if the random source fails or encryption fails.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.bytes).map_err(|e| Error::Encryption {
        reason: format!("failed to create cipher: {e}"),
    })?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| Error::Randomness {
            reason: format!("failed to generate nonce: {e}"),
        })?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::Encryption {
            reason: format!("encryption failed: {e}"),
        })?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Decrypts ciphertext that was encrypted with [`encrypt`].
///
/// Expects the input format: `nonce || ciphertext || tag`
///
/// # Errors
///
/// Returns an error if:
/// - The ciphertext is too short
/// - Authentication fails (wrong key or tampered data)
pub fn decrypt(key: &SecretKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Decryption {
            reason: format!(
                "ciphertext too short: expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                ciphertext.len()
            ),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(&key.bytes).map_err(|e| Error::Decryption {
        reason: format!("failed to create cipher: {e}"),
    })?;

    let (nonce, encrypted) = ciphertext.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), encrypted)
        .map_err(|e| Error::Decryption {
            reason: format!("authentication failed: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> SecretKey {
        SecretKey::from_bytes(&[fill; KEY_SIZE]).expect("valid key")
    }

    #[test]
    fn secret_key_from_bytes_wrong_length() {
        assert!(SecretKey::from_bytes(&[0u8; 16]).is_err());
        assert!(SecretKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn secret_key_debug_redacts() {
        let debug_str = format!("{:?}", test_key(7));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn derive_is_deterministic_and_identity_bound() {
        let a = SecretKey::derive("host-a", "salt");
        let a_again = SecretKey::derive("host-a", "salt");
        let b = SecretKey::derive("host-b", "salt");

        assert_eq!(a.as_bytes(), a_again.as_bytes());
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn derive_matches_sha256_of_concatenation() {
        let key = SecretKey::derive("abc", "def");
        let expected = Sha256::digest(b"abcdef");
        assert_eq!(key.as_bytes(), expected.as_slice());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key(1);
        let ciphertext = encrypt(&key, b"hello, world!").expect("encrypt");
        let decrypted = decrypt(&key, &ciphertext).expect("decrypt");
        assert_eq!(decrypted, b"hello, world!");
    }

    #[test]
    fn encrypt_uses_fresh_nonce() {
        let key = test_key(2);
        let ct1 = encrypt(&key, b"same message").expect("encrypt 1");
        let ct2 = encrypt(&key, b"same message").expect("encrypt 2");

        assert_ne!(ct1[..NONCE_SIZE], ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let ciphertext = encrypt(&test_key(3), b"secret").expect("encrypt");
        assert!(matches!(
            decrypt(&test_key(4), &ciphertext),
            Err(Error::Decryption { .. })
        ));
    }

    #[test]
    fn decrypt_tampered_data_fails() {
        let key = test_key(5);
        let mut ciphertext = encrypt(&key, b"secret message").expect("encrypt");
        if let Some(byte) = ciphertext.last_mut() {
            *byte ^= 0xFF;
        }
        assert!(decrypt(&key, &ciphertext).is_err());
    }

    #[test]
    fn decrypt_too_short_fails() {
        let key = test_key(6);
        let short = vec![0u8; NONCE_SIZE + TAG_SIZE - 1];
        assert!(decrypt(&key, &short).is_err());
    }

    #[test]
    fn ciphertext_length_is_predictable() {
        let key = test_key(8);
        let ciphertext = encrypt(&key, b"test message").expect("encrypt");
        assert_eq!(ciphertext.len(), NONCE_SIZE + 12 + TAG_SIZE);
    }
}
