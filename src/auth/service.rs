//! Account operations: register, login, logout, refresh and the password/email flows

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::identity::{GoogleGrant, Identity};
use super::password::{hash_password, verify_password};
use crate::common::{normalize_email, safe_email_log, ApiError};
use crate::services::{EmailService, GoogleIdentityProvider};
use crate::tokens::{AuthTokens, SingleUseToken, TokenError, TokenKind, TokenService};
use crate::users::models::{NewUser, User, UserUpdate};
use crate::users::UserService;

/// Result of a registration request
#[derive(Debug)]
pub enum Registration {
    /// A password was supplied: the account exists and is signed in
    Created { user: User, tokens: AuthTokens },
    /// No password: a set-password link was emailed, no account yet
    PendingPassword,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    tokens: Arc<TokenService>,
    email: Arc<EmailService>,
    google: Arc<dyn GoogleIdentityProvider>,
}

impl AuthService {
    pub fn new(
        users: UserService,
        tokens: Arc<TokenService>,
        email: Arc<EmailService>,
        google: Arc<dyn GoogleIdentityProvider>,
    ) -> Self {
        Self {
            users,
            tokens,
            email,
            google,
        }
    }

    pub fn google(&self) -> &dyn GoogleIdentityProvider {
        self.google.as_ref()
    }

    /// Resolve any identity strategy to an existing (or, for Google, newly linked) user
    pub async fn verify_identity(&self, identity: Identity) -> Result<User, ApiError> {
        debug!(strategy = identity.strategy(), "Verifying identity");
        match identity {
            Identity::Credentials { email, password } => {
                self.login_with_credentials(&email, &password).await
            }
            Identity::Bearer(token) => self.authenticate_bearer(&token).await,
            Identity::Google(grant) => self.login_with_google(grant).await,
        }
    }

    pub async fn login_with_credentials(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let user = match self.users.get_user_by_email(email).await? {
            Some(user) => user,
            None => {
                warn!(email = %safe_email_log(email), "Login failed: unknown email");
                return Err(ApiError::Unauthorized("This email is not registered".to_string()));
            }
        };

        let hashed = match user.password.as_deref() {
            Some(hashed) => hashed,
            None => {
                warn!(user_id = %user.id, "Login failed: account has no password");
                return Err(ApiError::Unauthorized(
                    "This account was created with Google".to_string(),
                ));
            }
        };

        if !verify_password(password, hashed).await? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(ApiError::Unauthorized("The password is incorrect".to_string()));
        }

        info!(user_id = %user.id, "User logged in with credentials");
        Ok(user)
    }

    /// Verify a stateless access token and load its subject
    async fn authenticate_bearer(&self, token: &str) -> Result<User, ApiError> {
        let claims = self.tokens.verify_access(token).map_err(|e| {
            warn!(error = %e, "Access token rejected");
            ApiError::Unauthorized("Please authenticate".to_string())
        })?;

        match self.users.get_user_by_id(&claims.sub).await? {
            Some(user) => Ok(user),
            None => {
                warn!(user_id = %claims.sub, "Authentication failed: user not found");
                Err(ApiError::Unauthorized("Please authenticate".to_string()))
            }
        }
    }

    /// Sign in through Google, creating or linking the local account as needed
    pub async fn login_with_google(&self, grant: GoogleGrant) -> Result<User, ApiError> {
        let access_token = match grant {
            GoogleGrant::AccessToken(token) => token,
            GoogleGrant::AuthorizationCode(code) => self.google.exchange_code(&code).await?,
        };

        let profile = self.google.userinfo(&access_token).await?;

        if let Some(user) = self.users.get_user_by_google_id(&profile.sub).await? {
            info!(user_id = %user.id, "User logged in with Google");
            return Ok(user);
        }

        let email = match profile.email.as_deref() {
            Some(email) if !email.is_empty() => normalize_email(email),
            _ => {
                warn!(google_id = %profile.sub, "Google profile has no email");
                return Err(ApiError::BadRequest("Google login failed".to_string()));
            }
        };

        match self.users.get_user_by_email(&email).await? {
            None => {
                let name = profile
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

                let user = self
                    .users
                    .create_user(NewUser {
                        name,
                        email,
                        google_id: Some(profile.sub),
                        email_verified: profile.email_verified,
                        ..Default::default()
                    })
                    .await?;
                info!(user_id = %user.id, "Created user from Google login");
                Ok(user)
            }
            Some(existing) if existing.google_id.is_none() => {
                let user = self
                    .users
                    .update_user_by_id(
                        &existing.id,
                        UserUpdate {
                            google_id: Some(profile.sub),
                            email_verified: profile.email_verified.then_some(true),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(user_id = %user.id, "Linked Google account to existing user");
                Ok(user)
            }
            Some(existing) => {
                info!(user_id = %existing.id, "User logged in with Google");
                Ok(existing)
            }
        }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: Option<&str>,
    ) -> Result<Registration, ApiError> {
        if self.users.get_user_by_email(email).await?.is_some() {
            return Err(ApiError::Conflict("This email is already being used".to_string()));
        }

        match password {
            Some(password) => {
                let hashed = hash_password(password).await?;
                let user = self
                    .users
                    .create_user(NewUser {
                        name: name.to_string(),
                        email: email.to_string(),
                        password: Some(hashed),
                        ..Default::default()
                    })
                    .await?;
                let tokens = self.tokens.issue_auth_tokens(&user.id).await?;
                Ok(Registration::Created { user, tokens })
            }
            None => {
                let email = normalize_email(email);
                let token = self.tokens.issue_password_token(name.trim(), &email)?;
                self.email.send_set_password_email(&email, &token).await?;
                info!(email = %safe_email_log(&email), "Sent set-password email for new account");
                Ok(Registration::PendingPassword)
            }
        }
    }

    /// Create the account named in a set-password token, then sign it in.
    ///
    /// If the account appeared in the meantime (a Google sign-in with the same email) it
    /// gets the password, as long as it has none yet. Once any password is set the token
    /// is spent.
    pub async fn set_password(&self, token: &str, password: &str) -> Result<(User, AuthTokens), ApiError> {
        let claims = match self
            .tokens
            .consume_single_use_token(token, TokenKind::SetPassword)
            .await
        {
            Ok(SingleUseToken::SelfContained(claims)) => claims,
            Ok(SingleUseToken::Persisted(_)) => {
                return Err(ApiError::Internal("Unexpected persisted set-password token".to_string()))
            }
            Err(e) => return Err(password_token_error(e)),
        };

        let hashed = hash_password(password).await?;

        let user = match self.users.get_user_by_email(&claims.email).await? {
            Some(existing) => {
                if existing.password.is_some()
                    || !self
                        .users
                        .set_password_if_unchanged(&existing.id, None, &hashed)
                        .await?
                {
                    return Err(ApiError::BadRequest("Your password has already been set".to_string()));
                }
                self.tokens.revoke_all_for_user(&existing.id).await?;
                self.users.require_user(&existing.id).await?
            }
            None => {
                self.users
                    .create_user(NewUser {
                        name: claims.name,
                        email: claims.email,
                        password: Some(hashed),
                        email_verified: true,
                        ..Default::default()
                    })
                    .await?
            }
        };

        let tokens = self.tokens.issue_auth_tokens(&user.id).await?;
        info!(user_id = %user.id, "Password set");
        Ok((user, tokens))
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let user = self.users.get_user_by_email(email).await?.ok_or_else(|| {
            ApiError::NotFound("User with this email does not exist".to_string())
        })?;

        let token = self
            .tokens
            .issue_single_use_token(TokenKind::ResetPassword, &user.id)
            .await?;
        self.email.send_reset_password_email(&user.email, &token).await?;

        info!(user_id = %user.id, "Sent reset password email");
        Ok(())
    }

    /// Consume a reset token, store the new password and end every session of the user
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        let record = match self
            .tokens
            .consume_single_use_token(token, TokenKind::ResetPassword)
            .await?
        {
            SingleUseToken::Persisted(record) => record,
            SingleUseToken::SelfContained(_) => {
                return Err(ApiError::Internal("Unexpected self-contained reset token".to_string()))
            }
        };

        let hashed = hash_password(password).await?;
        self.users
            .update_user_by_id(
                &record.user_id,
                UserUpdate {
                    password: Some(hashed),
                    ..Default::default()
                },
            )
            .await?;
        self.tokens.revoke_all_for_user(&record.user_id).await?;

        info!(user_id = %record.user_id, "Password reset");
        Ok(())
    }

    pub async fn send_verification_email(&self, user: &User) -> Result<(), ApiError> {
        if user.email_verified {
            return Err(ApiError::BadRequest("Email is already verified".to_string()));
        }

        let token = self
            .tokens
            .issue_single_use_token(TokenKind::VerifyEmail, &user.id)
            .await?;
        self.email.send_verification_email(&user.email, &token).await?;

        info!(user_id = %user.id, "Sent verification email");
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        let record = match self
            .tokens
            .consume_single_use_token(token, TokenKind::VerifyEmail)
            .await?
        {
            SingleUseToken::Persisted(record) => record,
            SingleUseToken::SelfContained(_) => {
                return Err(ApiError::Internal("Unexpected self-contained verify token".to_string()))
            }
        };

        self.users
            .update_user_by_id(
                &record.user_id,
                UserUpdate {
                    email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %record.user_id, "Email verified");
        Ok(())
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        self.tokens.revoke_refresh(refresh_token).await?;
        Ok(())
    }

    pub async fn refresh_auth(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        Ok(self.tokens.rotate_refresh(refresh_token).await?)
    }
}

/// Set-password tokens have no row, so every failure reads as a bad token
fn password_token_error(e: TokenError) -> ApiError {
    match e {
        TokenError::Expired => ApiError::BadRequest("Token has expired".to_string()),
        TokenError::InvalidSignature | TokenError::Malformed | TokenError::WrongKind { .. } => {
            ApiError::BadRequest("Token is invalid".to_string())
        }
        other => other.into(),
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}
