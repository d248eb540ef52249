//! # mb-auth-simple
//!
//! Argon2-based implementation of `SecretHasher`.
//! Delete passwords are stored as salted Argon2id PHC strings and verified
//! at delete time; the plaintext never reaches the document store.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use mb_core::traits::SecretHasher;

pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl Argon2SecretHasher {
    /// Builds a hasher with explicit cost parameters.
    ///
    /// `memory_kib` must be at least 8 per lane of `parallelism`.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2SecretHasher {
    /// The argon2 crate's recommended Argon2id defaults.
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash_secret(&self, secret: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("failed to hash delete password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verifies if a provided password matches a stored Argon2 hash.
    /// Cost parameters are read from the hash itself.
    fn verify_secret(&self, secret: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("stored delete password is not a valid PHC string: {e}");
                return false;
            }
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2SecretHasher {
        Argon2SecretHasher::new(8, 1, 1).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_secret() {
        let hasher = cheap();
        let hash = hasher.hash_secret("abc123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "abc123");
        assert!(hasher.verify_secret("abc123", &hash));
        assert!(!hasher.verify_secret("abc124", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = cheap();
        let a = hasher.hash_secret("same").unwrap();
        let b = hasher.hash_secret("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!cheap().verify_secret("abc123", "abc123"));
    }

    #[test]
    fn rejects_impossible_parameters() {
        assert!(Argon2SecretHasher::new(1, 1, 1).is_err());
    }
}
