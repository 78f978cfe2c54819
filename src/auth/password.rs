//! Credential verifier: bcrypt hashing off the async runtime

use thiserror::Error;
use tokio::task;

use crate::common::ApiError;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("password worker failed: {0}")]
    Worker(#[from] task::JoinError),
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

pub async fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let plain = plain.to_string();
    let hashed = task::spawn_blocking(move || bcrypt::hash(plain, HASH_COST)).await??;
    Ok(hashed)
}

/// A malformed stored hash never matches.
pub async fn verify_password(plain: &str, hashed: &str) -> Result<bool, PasswordError> {
    let plain = plain.to_string();
    let hashed = hashed.to_string();
    let matches = task::spawn_blocking(move || bcrypt::verify(plain, &hashed).unwrap_or(false)).await?;
    Ok(matches)
}
