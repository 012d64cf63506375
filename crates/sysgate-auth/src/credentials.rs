//! Admin password hashing and read-only key verification.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use parking_lot::RwLock;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::apikey::{ApiKeySecret, generate_read_only_key, hash_key, hashes_match};
use crate::error::{Error, Result};
use crate::types::{AuthConfig, ReadOnlyKeyRecord};

/// Cost parameters for the admin password hash (Argon2id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl HashCost {
    /// Production cost: 64 MiB, 3 passes. Well above 100ms per attempt.
    pub const ADMIN: Self = Self::new(64 * 1024, 3, 1);

    /// Creates a cost profile.
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32, lanes: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            lanes,
        }
    }

    fn hasher(self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.lanes, None)
            .map_err(|e| Error::Hashing {
                reason: format!("invalid argon2 params: {e}"),
            })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self::ADMIN
    }
}

/// Hashes an admin password with the production cost.
///
/// The output is a PHC string embedding algorithm, cost and salt.
///
/// # Errors
///
/// Returns an error if the random source or the hasher fails.
pub fn hash_admin_password(plaintext: &str) -> Result<String> {
    hash_admin_password_with(plaintext, HashCost::ADMIN)
}

/// Hashes an admin password with an explicit cost profile.
///
/// # Errors
///
/// Returns an error if the random source or the hasher fails.
pub fn hash_admin_password_with(plaintext: &str, cost: HashCost) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| Error::Randomness {
            reason: format!("failed to generate salt: {e}"),
        })?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| Error::Hashing {
        reason: format!("failed to encode salt: {e}"),
    })?;

    let hash = cost
        .hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| Error::Hashing {
            reason: format!("failed to hash password: {e}"),
        })?;
    Ok(hash.to_string())
}

/// Holds the current `[auth]` configuration and verifies credentials against it.
///
/// Verification methods copy what they need out of the lock before doing any
/// hashing, so the expensive password check never runs inside a critical section.
#[derive(Debug, Default)]
pub struct CredentialManager {
    config: RwLock<AuthConfig>,
}

impl CredentialManager {
    /// Creates a manager over the given auth configuration.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Checks a plaintext password against the stored admin hash.
    ///
    /// Returns false for a wrong password, a missing hash and a malformed hash
    /// alike.
    #[must_use]
    pub fn verify_admin_password(&self, plaintext: &str) -> bool {
        let stored = self.config.read().admin_password_hash.clone();
        if stored.is_empty() {
            debug!("admin login attempted with no password configured");
            return false;
        }

        let parsed = match PasswordHash::new(&stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored admin password hash is malformed");
                return false;
            }
        };

        // Cost and salt come from the PHC string itself.
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Finds the read-only key whose digest matches `candidate`.
    ///
    /// Every stored digest is compared in constant time; the first match wins.
    #[must_use]
    pub fn verify_read_only_key(&self, candidate: &str) -> Option<String> {
        if candidate.is_empty() {
            return None;
        }
        let digest = hash_key(candidate);
        let config = self.config.read();
        let mut matched = None;
        for record in &config.read_only_keys {
            if hashes_match(&record.key_hash, &digest) && matched.is_none() {
                matched = Some(record.name.clone());
            }
        }
        matched
    }

    /// Returns the names of all read-only keys.
    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        self.config
            .read()
            .read_only_keys
            .iter()
            .map(|k| k.name.clone())
            .collect()
    }

    /// Creates a read-only key under a unique name and returns the plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or taken, or randomness fails.
    pub fn add_key(&self, name: &str) -> Result<ApiKeySecret> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidKeyName {
                reason: "name is required".to_string(),
            });
        }

        let (secret, key_hash) = generate_read_only_key()?;

        let mut config = self.config.write();
        if config.read_only_keys.iter().any(|k| k.name == name) {
            return Err(Error::DuplicateKey {
                name: name.to_string(),
            });
        }
        config.read_only_keys.push(ReadOnlyKeyRecord {
            name: name.to_string(),
            key_hash,
        });
        drop(config);

        info!(name, "created read-only key");
        Ok(secret)
    }

    /// Deletes the read-only key with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if no key has that name.
    pub fn remove_key(&self, name: &str) -> Result<()> {
        let mut config = self.config.write();
        let before = config.read_only_keys.len();
        config.read_only_keys.retain(|k| k.name != name);
        if config.read_only_keys.len() == before {
            return Err(Error::KeyNotFound {
                name: name.to_string(),
            });
        }
        drop(config);

        info!(name, "deleted read-only key");
        Ok(())
    }

    /// Returns true if an admin password hash is configured.
    #[must_use]
    pub fn has_admin_password(&self) -> bool {
        !self.config.read().admin_password_hash.is_empty()
    }

    /// Replaces the stored admin password hash.
    pub fn set_admin_password_hash(&self, hash: String) {
        self.config.write().admin_password_hash = hash;
    }

    /// Stores `hash` only if no admin password is configured yet.
    ///
    /// Returns false, leaving the current hash in place, if one was already
    /// set. The check and the write happen under one lock.
    pub fn set_admin_password_hash_if_unset(&self, hash: String) -> bool {
        let mut config = self.config.write();
        if !config.admin_password_hash.is_empty() {
            return false;
        }
        config.admin_password_hash = hash;
        true
    }

    /// Clears the admin password hash if it still equals `hash`.
    ///
    /// Returns whether it was cleared.
    pub fn clear_admin_password_hash_if(&self, hash: &str) -> bool {
        let mut config = self.config.write();
        if config.admin_password_hash != hash {
            return false;
        }
        config.admin_password_hash.clear();
        true
    }

    /// Returns a copy of the current configuration for persistence.
    #[must_use]
    pub fn snapshot(&self) -> AuthConfig {
        self.config.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FAST: HashCost = HashCost::new(8, 1, 1);

    fn manager_with_password(password: &str) -> CredentialManager {
        let hash = hash_admin_password_with(password, FAST).expect("hash");
        CredentialManager::new(AuthConfig {
            admin_password_hash: hash,
            read_only_keys: Vec::new(),
        })
    }

    #[test]
    fn hash_is_self_describing() {
        let hash = hash_admin_password_with("pw", FAST).expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=8,t=1,p=1"));
    }

    #[test]
    fn production_cost_is_argon2id_64mib() {
        assert_eq!(HashCost::default(), HashCost::new(65536, 3, 1));
        assert!(HashCost::ADMIN.hasher().is_ok());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_admin_password_with("pw", FAST).expect("hash");
        let b = hash_admin_password_with("pw", FAST).expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_admin_password_accepts_correct() {
        let manager = manager_with_password("correct horse");
        assert!(manager.verify_admin_password("correct horse"));
        assert!(!manager.verify_admin_password("correct horse "));
        assert!(!manager.verify_admin_password(""));
    }

    #[test]
    fn missing_or_malformed_hash_never_verifies() {
        let manager = CredentialManager::default();
        assert!(!manager.has_admin_password());
        assert!(!manager.verify_admin_password(""));

        manager.set_admin_password_hash("not-a-phc-string".to_string());
        assert!(!manager.verify_admin_password("not-a-phc-string"));
    }

    #[test]
    fn set_if_unset_keeps_first_hash() {
        let manager = CredentialManager::default();
        assert!(manager.set_admin_password_hash_if_unset("first".to_string()));
        assert!(!manager.set_admin_password_hash_if_unset("second".to_string()));
        assert_eq!(manager.snapshot().admin_password_hash, "first");
    }

    #[test]
    fn concurrent_set_if_unset_has_one_winner() {
        let manager = std::sync::Arc::new(CredentialManager::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = std::sync::Arc::clone(&manager);
                std::thread::spawn(move || manager.set_admin_password_hash_if_unset(format!("hash-{i}")))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(manager.has_admin_password());
    }

    #[test]
    fn clear_only_removes_matching_hash() {
        let manager = CredentialManager::default();
        manager.set_admin_password_hash("theirs".to_string());

        assert!(!manager.clear_admin_password_hash_if("mine"));
        assert_eq!(manager.snapshot().admin_password_hash, "theirs");

        assert!(manager.clear_admin_password_hash_if("theirs"));
        assert!(!manager.has_admin_password());
    }

    #[test]
    fn add_and_verify_read_only_key() {
        let manager = CredentialManager::default();
        let secret = manager.add_key("  grafana ").expect("add");

        assert_eq!(manager.list_keys(), vec!["grafana".to_string()]);
        assert_eq!(
            manager.verify_read_only_key(secret.expose()),
            Some("grafana".to_string())
        );
        assert_eq!(manager.verify_read_only_key("wrong"), None);
        assert_eq!(manager.verify_read_only_key(""), None);

        // Only the digest is retained.
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.read_only_keys[0].key_hash, secret.hash());
        assert_ne!(snapshot.read_only_keys[0].key_hash, secret.expose());
    }

    #[test]
    fn duplicate_and_empty_names_rejected() {
        let manager = CredentialManager::default();
        manager.add_key("ci").expect("add");
        assert!(matches!(manager.add_key("ci"), Err(Error::DuplicateKey { .. })));
        assert!(matches!(manager.add_key("   "), Err(Error::InvalidKeyName { .. })));
        assert_eq!(manager.list_keys().len(), 1);
    }

    #[test]
    fn remove_key_revokes_access() {
        let manager = CredentialManager::default();
        let secret = manager.add_key("temp").expect("add");
        manager.remove_key("temp").expect("remove");

        assert_eq!(manager.verify_read_only_key(secret.expose()), None);
        assert!(matches!(manager.remove_key("temp"), Err(Error::KeyNotFound { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_password_roundtrip(password in "[ -~]{1,32}", other in "[ -~]{1,32}") {
            let manager = manager_with_password(&password);
            prop_assert!(manager.verify_admin_password(&password));
            if other != password {
                prop_assert!(!manager.verify_admin_password(&other));
            }
        }

        #[test]
        fn prop_bit_flip_fails_key_verification(byte in 0usize..64, bit in 0u8..8) {
            let manager = CredentialManager::default();
            let secret = manager.add_key("k").expect("add");
            let mut mutated = secret.expose().as_bytes().to_vec();
            mutated[byte] ^= 1 << bit;
            // A flipped bit may leave non-UTF-8 bytes; compare lossily.
            let mutated = String::from_utf8_lossy(&mutated).into_owned();
            prop_assert_eq!(manager.verify_read_only_key(secret.expose()), Some("k".to_string()));
            prop_assert_eq!(manager.verify_read_only_key(&mutated), None);
        }
    }
}
