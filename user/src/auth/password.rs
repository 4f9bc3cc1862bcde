//! Argon2 password hashing

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use tracing::error;

use crate::error::{Result, UserError};

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            UserError::PasswordHash(e.to_string())
        })
}

/// Checks `password` against a stored PHC string.
///
/// A mismatch is `Ok(false)`. Only an unparseable stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Stored password hash could not be parsed: {}", e);
        UserError::PasswordHash(e.to_string())
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("exptrack-dummy-password").unwrap_or_default());

/// Runs a full verification against a throwaway hash.
///
/// Used when the identity is unknown so that path costs the same as a
/// wrong password.
pub fn verify_dummy(password: &str) {
    if DUMMY_HASH.is_empty() {
        return;
    }
    let _ = verify_password(password, &DUMMY_HASH);
}
