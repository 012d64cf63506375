//! The `enc:` stored-secret format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::encryption::{self, SecretKey};
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;

/// Prefix marking an encrypted stored secret.
pub const ENC_PREFIX: &str = "enc:";

/// Fixed application salt mixed into the host identity.
pub const KEY_SALT: &str = "sysgate-v1-config-key";

/// Encrypts and decrypts stored secrets with a key bound to the host identity.
///
/// Ciphertext produced on one host cannot be decrypted on another unless the
/// identity file travels with it.
#[derive(Debug, Clone)]
pub struct SecretCodec {
    key: SecretKey,
}

impl SecretCodec {
    /// Derives the codec key from the given identity provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot supply an identity.
    pub fn from_provider(provider: &dyn IdentityProvider) -> Result<Self> {
        let identity = provider.identity()?;
        Ok(Self::from_identity(&identity))
    }

    /// Derives the codec key from an identity string.
    #[must_use]
    pub fn from_identity(identity: &str) -> Self {
        Self {
            key: SecretKey::derive(identity, KEY_SALT),
        }
    }

    /// Encrypts `plaintext` into `enc:<base64(nonce || ciphertext || tag)>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source or the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let sealed = encryption::encrypt(&self.key, plaintext.as_bytes())?;
        Ok(format!("{ENC_PREFIX}{}", STANDARD.encode(sealed)))
    }

    /// Decrypts a stored secret.
    ///
    /// Values without the `enc:` prefix are legacy plaintext and are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64, fails
    /// authentication, or is not UTF-8.
    pub fn decrypt(&self, value: &str) -> Result<String> {
        let Some(encoded) = value.strip_prefix(ENC_PREFIX) else {
            return Ok(value.to_string());
        };

        let sealed = STANDARD.decode(encoded).map_err(|e| Error::Encoding {
            reason: format!("invalid base64 payload: {e}"),
        })?;
        let plaintext = encryption::decrypt(&self.key, &sealed)?;

        String::from_utf8(plaintext).map_err(|e| Error::Decryption {
            reason: format!("plaintext is not utf-8: {e}"),
        })
    }

    /// Reports whether a stored value is already encrypted.
    #[must_use]
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENC_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use proptest::prelude::*;
    use test_case::test_case;

    fn codec() -> SecretCodec {
        SecretCodec::from_provider(&StaticIdentity::new("test-host")).expect("codec")
    }

    #[test]
    fn encrypted_value_has_prefix() {
        let stored = codec().encrypt("hunter2").expect("encrypt");
        assert!(stored.starts_with(ENC_PREFIX));
        assert!(SecretCodec::is_encrypted(&stored));
        assert!(!stored.contains("hunter2"));
    }

    #[test_case("" ; "empty")]
    #[test_case("plain-password" ; "plain")]
    #[test_case("enc" ; "prefix without colon")]
    fn plaintext_passes_through(value: &str) {
        assert_eq!(codec().decrypt(value).expect("decrypt"), value);
    }

    #[test]
    fn other_host_cannot_decrypt() {
        let stored = codec().encrypt("db-pass").expect("encrypt");
        let other = SecretCodec::from_identity("other-host");
        assert!(matches!(other.decrypt(&stored), Err(Error::Decryption { .. })));
    }

    #[test]
    fn invalid_base64_is_encoding_error() {
        assert!(matches!(
            codec().decrypt("enc:not base64!!"),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn tampered_payload_fails() {
        let stored = codec().encrypt("db-pass").expect("encrypt");
        let mut sealed = STANDARD.decode(&stored[ENC_PREFIX.len()..]).expect("base64");
        sealed[crate::encryption::NONCE_SIZE] ^= 0x01;
        let tampered = format!("{ENC_PREFIX}{}", STANDARD.encode(sealed));
        assert!(codec().decrypt(&tampered).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip_same_identity(secret in ".{0,64}") {
            let codec = codec();
            let stored = codec.encrypt(&secret).expect("encrypt");
            prop_assert_eq!(codec.decrypt(&stored).expect("decrypt"), secret);
        }
    }
}
