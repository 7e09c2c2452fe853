//! Password hashing and verification using Argon2.
//!
//! Argon2 is deliberately slow, so the async entry points run it on tokio's
//! blocking pool rather than on a runtime worker.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::utils::error::{AppError, Result};

/// Hash a password into a PHC string
pub async fn hash_password(password: String) -> Result<String> {
    off_runtime(move || hash_password_blocking(&password)).await
}

/// Verify a password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
pub async fn verify_password(hash: String, password: String) -> Result<bool> {
    off_runtime(move || verify_password_blocking(&hash, &password)).await
}

async fn off_runtime<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalServerError(format!("password task failed: {e}")))?
}

fn hash_password_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {e}")))?;

    Ok(password_hash.to_string())
}

fn verify_password_blocking(hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        AppError::InternalServerError(format!("Failed to parse password hash: {e}"))
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::InternalServerError(format!(
            "Password verification failed: {e}"
        ))),
    }
}
