//! Token lifecycle: the only place that mints, verifies and retires tokens.

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::codec::{Claims, CodecError, PasswordClaims, TokenCodec};
use super::models::{AuthTokens, SingleUseToken, StoredToken, TokenGrant, TokenKind};
use super::store::{NewToken, TokenStore};
use crate::common::config::JwtConfig;
use crate::common::{safe_token_log, ApiError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token not found")]
    NotFound,

    #[error("expected a {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("token has been revoked")]
    Blacklisted,

    #[error("token has expired")]
    Expired,

    #[error("token subject does not own the stored token")]
    OwnerMismatch,

    #[error("token already exists")]
    DuplicateToken,

    #[error("token could not be signed: {0}")]
    Encoding(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CodecError> for TokenError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::InvalidSignature => TokenError::InvalidSignature,
            CodecError::Malformed => TokenError::Malformed,
            CodecError::Encoding(msg) => TokenError::Encoding(msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::NotFound | TokenError::WrongKind { .. } => {
                ApiError::NotFound("Token not found".to_string())
            }
            TokenError::Expired => ApiError::Unauthorized("Token has expired".to_string()),
            TokenError::Blacklisted => ApiError::Unauthorized("Token has been revoked".to_string()),
            TokenError::InvalidSignature | TokenError::Malformed | TokenError::OwnerMismatch => {
                ApiError::Unauthorized("Token is invalid".to_string())
            }
            TokenError::DuplicateToken | TokenError::Encoding(_) => {
                ApiError::Internal(format!("Token issuance failed: {}", e))
            }
            TokenError::Database(db) => ApiError::Database(db),
        }
    }
}

/// Lifetime of every token kind
#[derive(Debug, Clone)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub reset_password: Duration,
    pub verify_email: Duration,
    pub set_password: Duration,
}

impl TokenTtls {
    pub fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access,
            TokenKind::Refresh => self.refresh,
            TokenKind::ResetPassword => self.reset_password,
            TokenKind::VerifyEmail => self.verify_email,
            TokenKind::SetPassword => self.set_password,
        }
    }
}

impl From<&JwtConfig> for TokenTtls {
    fn from(config: &JwtConfig) -> Self {
        Self {
            access: config.access_ttl,
            refresh: config.refresh_ttl,
            reset_password: config.reset_password_ttl,
            verify_email: config.verify_email_ttl,
            set_password: config.set_password_ttl,
        }
    }
}

/// Current time truncated to the one-second resolution of token claims
fn now() -> DateTime<Utc> {
    let ts = Utc::now().timestamp();
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

#[derive(Debug)]
pub struct TokenService {
    codec: TokenCodec,
    store: TokenStore,
    ttls: TokenTtls,
}

impl TokenService {
    pub fn new(config: &JwtConfig, store: TokenStore) -> Self {
        Self {
            codec: TokenCodec::new(&config.secret),
            store,
            ttls: TokenTtls::from(config),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn sign(
        &self,
        user_id: &str,
        issued_at: DateTime<Utc>,
        kind: TokenKind,
    ) -> Result<TokenGrant, TokenError> {
        let expires = issued_at + self.ttls.for_kind(kind);
        let claims = Claims::new(user_id, issued_at.timestamp(), expires.timestamp(), kind);
        let token = self.codec.sign(&claims)?;
        Ok(TokenGrant { token, expires })
    }

    fn new_auth_pair(&self, user_id: &str) -> Result<AuthTokens, TokenError> {
        let issued_at = now();
        Ok(AuthTokens {
            access: self.sign(user_id, issued_at, TokenKind::Access)?,
            refresh: self.sign(user_id, issued_at, TokenKind::Refresh)?,
        })
    }

    /// Mint a stateless access token and a persisted refresh token.
    pub async fn issue_auth_tokens(&self, user_id: &str) -> Result<AuthTokens, TokenError> {
        let tokens = self.new_auth_pair(user_id)?;
        self.store
            .save(NewToken {
                token: &tokens.refresh.token,
                user_id,
                expires_at: tokens.refresh.expires,
                kind: TokenKind::Refresh,
                blacklisted: false,
            })
            .await?;

        debug!(user_id = %user_id, "Issued auth token pair");
        Ok(tokens)
    }

    /// Verify a persisted token: signature, store row, kind, blacklist, expiry and owner.
    pub async fn verify(&self, token: &str, expected: TokenKind) -> Result<StoredToken, TokenError> {
        let claims: Claims = self.codec.parse(token)?;

        let record = self.store.find_by_token(token).await?.ok_or(TokenError::NotFound)?;

        if record.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: record.kind,
            });
        }
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        if record.blacklisted {
            return Err(TokenError::Blacklisted);
        }
        let now = Utc::now();
        if record.is_expired_at(now) || claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        if record.user_id != claims.sub {
            warn!(
                token = %safe_token_log(token),
                "Token subject does not match stored owner"
            );
            return Err(TokenError::OwnerMismatch);
        }

        Ok(record)
    }

    /// Signature-only check for stateless access tokens.
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims: Claims = self.codec.parse(token)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: claims.kind,
            });
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new pair. The old token is unusable afterwards.
    ///
    /// Delete-old and insert-new commit together; a concurrent rotation of the same token
    /// loses with `NotFound`.
    pub async fn rotate_refresh(&self, refresh_token: &str) -> Result<AuthTokens, TokenError> {
        let record = self.verify(refresh_token, TokenKind::Refresh).await?;
        let tokens = self.new_auth_pair(&record.user_id)?;

        self.store
            .replace(
                refresh_token,
                NewToken {
                    token: &tokens.refresh.token,
                    user_id: &record.user_id,
                    expires_at: tokens.refresh.expires,
                    kind: TokenKind::Refresh,
                    blacklisted: false,
                },
            )
            .await?;

        info!(user_id = %record.user_id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Mint a persisted single-use token (reset password or verify email).
    /// Outstanding tokens of the same kind for the user are replaced.
    pub async fn issue_single_use_token(
        &self,
        kind: TokenKind,
        user_id: &str,
    ) -> Result<String, TokenError> {
        if !matches!(kind, TokenKind::ResetPassword | TokenKind::VerifyEmail) {
            return Err(TokenError::WrongKind {
                expected: TokenKind::ResetPassword,
                found: kind,
            });
        }

        let grant = self.sign(user_id, now(), kind)?;
        self.store.delete_for_user_by_kind(user_id, kind).await?;
        self.store
            .save(NewToken {
                token: &grant.token,
                user_id,
                expires_at: grant.expires,
                kind,
                blacklisted: false,
            })
            .await?;

        debug!(user_id = %user_id, kind = %kind, "Issued single-use token");
        Ok(grant.token)
    }

    /// Mint a self-contained set-password token carrying the account identity.
    pub fn issue_password_token(&self, name: &str, email: &str) -> Result<String, TokenError> {
        let issued_at = now();
        let expires = issued_at + self.ttls.set_password;
        let claims = PasswordClaims::new(name, email, issued_at.timestamp(), expires.timestamp());
        Ok(self.codec.sign(&claims)?)
    }

    /// Verify and retire a single-use token.
    ///
    /// Persisted kinds are deleted; if another request consumed the row first this
    /// reports `NotFound`. Set-password tokens have no row and are checked by signature
    /// and expiry only; they are spent once the account has a password.
    pub async fn consume_single_use_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<SingleUseToken, TokenError> {
        match kind {
            TokenKind::SetPassword => {
                let claims: PasswordClaims = self.codec.parse(token)?;
                if claims.kind != TokenKind::SetPassword {
                    return Err(TokenError::WrongKind {
                        expected: kind,
                        found: claims.kind,
                    });
                }
                if claims.exp <= Utc::now().timestamp() {
                    return Err(TokenError::Expired);
                }
                Ok(SingleUseToken::SelfContained(claims))
            }
            TokenKind::ResetPassword | TokenKind::VerifyEmail => {
                let record = self.verify(token, kind).await?;
                if !self.store.delete(token).await? {
                    return Err(TokenError::NotFound);
                }
                debug!(user_id = %record.user_id, kind = %kind, "Consumed single-use token");
                Ok(SingleUseToken::Persisted(record))
            }
            TokenKind::Access | TokenKind::Refresh => Err(TokenError::WrongKind {
                expected: TokenKind::ResetPassword,
                found: kind,
            }),
        }
    }

    /// Retire a refresh token on logout. Unknown or already revoked tokens are a no-op.
    pub async fn revoke_refresh(&self, refresh_token: &str) -> Result<(), TokenError> {
        let record = self
            .store
            .find_by_token(refresh_token)
            .await?
            .filter(|r| r.kind == TokenKind::Refresh);

        match record {
            Some(record) => {
                self.store.delete_by_id(&record.id).await?;
                info!(user_id = %record.user_id, "Refresh token revoked");
            }
            None => debug!("Logout with unknown refresh token"),
        }
        Ok(())
    }

    /// Invalidate every standing refresh and reset-password token of a user.
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, TokenError> {
        let refresh = self
            .store
            .delete_for_user_by_kind(user_id, TokenKind::Refresh)
            .await?;
        let reset = self
            .store
            .delete_for_user_by_kind(user_id, TokenKind::ResetPassword)
            .await?;

        info!(user_id = %user_id, revoked = refresh + reset, "Revoked all sessions for user");
        Ok(refresh + reset)
    }

    /// Mark a stored token as revoked without consuming it.
    pub async fn blacklist(&self, token: &str) -> Result<(), TokenError> {
        if !self.store.set_blacklisted(token, true).await? {
            return Err(TokenError::NotFound);
        }
        info!(token = %safe_token_log(token), "Token blacklisted");
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64, TokenError> {
        self.store.delete_expired(Utc::now()).await
    }
}
