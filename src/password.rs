//! Password hashing with Argon2id.
//!
//! Hashes are salted PHC strings (`$argon2id$...`), so each registration
//! produces a distinct hash even for identical passwords. Verification
//! against a malformed stored hash is treated as a mismatch, not an error,
//! so login failures stay indistinguishable to the caller.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::{ServiceError, ServiceResult};

/// Hash a plaintext password into a PHC-format Argon2id string.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored PHC hash string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// A parseable Argon2id hash that never verifies.
///
/// Used by the login path when the email is unknown, so the handler burns
/// the same verification time whether or not the user exists.
pub const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";
