//! Password hashing and verification

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};

use crate::error::{UserError, UserResult};

/// Hash a plaintext password with Argon2id and a fresh salt
pub fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a plaintext password against a stored hash
///
/// A mismatch is `Ok(false)`; only an unreadable hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> UserResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| UserError::Internal(format!("Failed to parse password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(UserError::Internal(format!(
            "Failed to verify password: {}",
            e
        ))),
    }
}
