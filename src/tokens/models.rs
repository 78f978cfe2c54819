//! Token data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::codec::PasswordClaims;

/// Kind tag carried in every signed token and in stored token rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
    /// Self-contained token that carries the account identity before a user row exists
    SetPassword,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
            TokenKind::ResetPassword => "RESET_PASSWORD",
            TokenKind::VerifyEmail => "VERIFY_EMAIL",
            TokenKind::SetPassword => "SET_PASSWORD",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token row as stored in the database
#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct StoredToken {
    pub id: String,
    pub token: String,
    #[sqlx(rename = "type")]
    pub kind: TokenKind,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A signed token together with its absolute expiry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Access + refresh pair returned by login, registration and rotation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthTokens {
    pub access: TokenGrant,
    pub refresh: TokenGrant,
}

/// Outcome of consuming a single-use token
#[derive(Debug, Clone, PartialEq)]
pub enum SingleUseToken {
    /// The store row that was just deleted
    Persisted(StoredToken),
    /// Signed claims of a token that never had a row
    SelfContained(PasswordClaims),
}
