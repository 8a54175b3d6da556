// Password hashing and verification
// New hashes are Argon2id; legacy bcrypt hashes still verify

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2id parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
    /// Output hash length in bytes
    pub output_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP minimum for Argon2id
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for test suites
    pub fn fast() -> Self {
        Self {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }

    fn build_hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_length),
        )
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password into an Argon2id PHC string (`$argon2id$v=19$m=...,t=...,p=...$...`).
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let argon2 = config.build_hasher()?;
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

    Ok(password_hash.to_string())
}

fn is_bcrypt_hash(hash: &str) -> bool {
    hash.starts_with("$2a$") || hash.starts_with("$2b$") || hash.starts_with("$2y$")
}

/// Verify a password against a stored hash.
///
/// Accepts Argon2 PHC strings and bcrypt hashes imported from older deployments.
/// A mismatch is `Ok(false)`; only malformed hashes are errors.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if is_bcrypt_hash(hash) {
        return bcrypt::verify(password, hash).map_err(|_| PasswordError::InvalidHashFormat);
    }

    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    // Params come from the hash itself
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// True when the stored hash should be replaced on next successful login
pub fn needs_rehash(hash: &str, config: &PasswordConfig) -> Result<bool, PasswordError> {
    if is_bcrypt_hash(hash) {
        return Ok(true);
    }

    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    if parsed_hash.algorithm != Algorithm::Argon2id.ident() {
        return Ok(true);
    }

    for (ident, value) in parsed_hash.params.iter() {
        let expected = match ident.as_str() {
            "m" => config.memory_cost,
            "t" => config.time_cost,
            "p" => config.parallelism,
            _ => continue,
        };
        if let Ok(actual) = value.decimal() {
            if actual != expected {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let password = "hunter22";
        let hash = hash_password_with_config(password, &PasswordConfig::fast())
            .expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("Failed to verify password"));
        assert!(!verify_password("hunter23", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let config = PasswordConfig::fast();
        let hash1 = hash_password_with_config("TestPassword123!", &config).unwrap();
        let hash2 = hash_password_with_config("TestPassword123!", &config).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("TestPassword123!", &hash1).unwrap());
        assert!(verify_password("TestPassword123!", &hash2).unwrap());
    }

    #[test]
    fn test_legacy_bcrypt_hash_verifies() {
        let legacy = bcrypt::hash("old-password", 4).expect("bcrypt hash");

        assert!(verify_password("old-password", &legacy).unwrap());
        assert!(!verify_password("new-password", &legacy).unwrap());
        assert!(needs_rehash(&legacy, &PasswordConfig::default()).unwrap());
    }

    #[test]
    fn test_needs_rehash_on_param_change() {
        let hash = hash_password_with_config("TestRehash123!", &PasswordConfig::fast()).unwrap();

        assert!(!needs_rehash(&hash, &PasswordConfig::fast()).unwrap());
        assert!(needs_rehash(&hash, &PasswordConfig::default()).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "not_a_valid_hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }
}
