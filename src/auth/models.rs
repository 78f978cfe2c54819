//! Authentication request and response bodies

use serde::{Deserialize, Serialize};

use crate::tokens::AuthTokens;
use crate::users::models::User;

/// POST /auth/register. Without a password the account is finished through set-password.
#[derive(Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/google with a Google OAuth access token
#[derive(Deserialize, Debug, Clone)]
pub struct GoogleLoginRequest {
    pub token: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Body of logout and refresh-tokens
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Body of reset-password; the token travels in the query string
#[derive(Deserialize, Debug, Clone)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// `?token=` of reset-password and verify-email
#[derive(Deserialize, Debug, Clone)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: AuthTokens,
}
