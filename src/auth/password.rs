//! Password hashing and verification (Argon2id)
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=1$<salt>$<hash>`) with a
//! fresh random salt per call, so the stored value carries everything needed
//! to verify it later, including the work factor it was produced with.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::AppConfig;
use crate::error::{RegistryError, Result};

/// One-way password hasher with a tunable work factor
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Creates a hasher with the given memory cost (KiB) and iteration count
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| RegistryError::ConfigError(format!("Invalid hashing parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.hash_memory_kib, config.hash_iterations)
    }

    /// Hashes a plaintext password into a PHC string
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| RegistryError::HashingError(format!("Failed to hash password: {}", e)))
    }

    /// Checks a plaintext password against a stored hash.
    ///
    /// Malformed hashes verify as `false`: a corrupted record must lock its
    /// owner out rather than surface an error path that differs from a wrong
    /// password.
    pub fn verify(&self, plaintext: &str, hashed: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "secret1");
        assert!(hasher.verify("secret1", &hash));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();
        assert!(!hasher.verify("secret2", &hash));
        assert!(!hasher.verify("", &hash));
        assert!(!hasher.verify("Secret1", &hash));
    }

    #[test]
    fn test_salt_differs_per_call() {
        let hasher = hasher();
        let a = hasher.hash("same-password").unwrap();
        let b = hasher.hash("same-password").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("same-password", &a));
        assert!(hasher.verify("same-password", &b));
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let hasher = hasher();
        assert!(!hasher.verify("secret1", "not-a-phc-string"));
        assert!(!hasher.verify("secret1", ""));
        // A legacy plaintext value left in the hash field never matches
        assert!(!hasher.verify("secret1", "secret1"));
    }

    #[test]
    fn test_verifies_hash_from_different_work_factor() {
        let light = hasher();
        let heavier = PasswordHasher::new(2048, 2).unwrap();
        let hash = heavier.hash("secret1").unwrap();
        assert!(light.verify("secret1", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::new(1, 0).is_err());
    }
}
