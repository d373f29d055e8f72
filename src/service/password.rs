//! Argon2id password hashing.
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};

use crate::config::AuthConfig;
use crate::error::{AppError, Result};

/// Hashes and verifies passwords as PHC strings.
#[derive(Clone)]
pub struct PasswordService {
    params: Params,
}

impl PasswordService {
    /// Create a hasher with the configured cost.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the cost parameters are out of range.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let params = Params::new(config.hash_memory_kib, config.hash_iterations, 1, None)
            .map_err(|e| AppError::Internal(format!("Invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let argon2 = self.argon2();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt_bytes: [u8; 16] = rand::random();
            let salt = SaltString::encode_b64(&salt_bytes)
                .map_err(|e| AppError::Internal(format!("Failed to encode salt: {e}")))?;
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
    }

    /// Check a password against a stored PHC string.
    ///
    /// A malformed stored hash never verifies.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the blocking task fails.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool> {
        let argon2 = self.argon2();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&stored_hash) else {
                tracing::warn!("Stored password hash is not a PHC string");
                return false;
            };
            argon2.verify_password(password.as_bytes(), &parsed).is_ok()
        })
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        // Minimum cost keeps the tests fast.
        PasswordService::new(&AuthConfig {
            hash_memory_kib: 8,
            hash_iterations: 1,
            ..AuthConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let service = service();
        let hash = service.hash("correct horse").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify("correct horse", &hash).await.unwrap());
        assert!(!service.verify("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salted() {
        let service = service();
        let first = service.hash("same").await.unwrap();
        let second = service.hash("same").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_never_verifies() {
        assert!(!service().verify("anything", "plaintext").await.unwrap());
    }

    #[test]
    fn test_invalid_params() {
        let result = PasswordService::new(&AuthConfig {
            hash_memory_kib: 0,
            ..AuthConfig::default()
        });
        assert!(result.is_err());
    }
}
