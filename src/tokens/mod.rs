//! # Tokens Module
//!
//! Token lifecycle for the API:
//! - `codec`: HS256 signing and parsing of claims
//! - `store`: persisted refresh, reset-password and verify-email rows
//! - `service`: issuance, verification, rotation and revocation
//! - `cleanup`: periodic purge of expired rows
//!
//! Access tokens are stateless. Every kind that can be revoked has a row.

pub mod cleanup;
pub mod codec;
pub mod models;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use cleanup::start_cleanup_task;
pub use codec::{Claims, PasswordClaims};
pub use models::{AuthTokens, SingleUseToken, StoredToken, TokenGrant, TokenKind};
pub use service::{TokenError, TokenService};
pub use store::TokenStore;
