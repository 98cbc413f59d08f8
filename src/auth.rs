//! Password hashing for chirp accounts.
//!
//! Passwords are stored as argon2id PHC strings, never in plaintext. The
//! verifier parses whatever hash is in the store, so parameters can change
//! over time without invalidating old accounts.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;

use crate::error::{ChirpError, Result};

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
///
/// Returns an error if the hashing backend fails (effectively never for
/// valid parameters).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ChirpError::password_hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
///
/// An unparseable hash verifies as false rather than erroring; a corrupt
/// row must not be distinguishable from a wrong password at the prompt.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
