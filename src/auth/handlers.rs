//! Authentication handlers

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::extractors::AuthedUser;
use super::identity::{GoogleGrant, Identity};
use super::models::{
    AuthResponse, ForgotPasswordRequest, GoogleCallbackQuery, GoogleLoginRequest, LoginRequest,
    RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, SetPasswordRequest, TokenQuery,
};
use super::service::Registration;
use crate::common::{safe_email_log, ApiError, ApiJson, ApiQuery, AppState, Validator};

/// POST /auth/register
///
/// With a password the account is created and signed in (201 `{user, tokens}`).
/// Without one a set-password link is emailed (204).
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    payload.validate(&payload).into_result()?;
    info!(email = %safe_email_log(&payload.email), "Registration request");

    let registration = state
        .auth
        .register(&payload.name, &payload.email, payload.password.as_deref())
        .await?;

    Ok(match registration {
        Registration::Created { user, tokens } => {
            (StatusCode::CREATED, Json(AuthResponse { user, tokens })).into_response()
        }
        Registration::PendingPassword => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /auth/login
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate(&payload).into_result()?;

    let user = state
        .auth
        .verify_identity(Identity::Credentials {
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let tokens = state.tokens.issue_auth_tokens(&user.id).await?;

    Ok(Json(AuthResponse { user, tokens }))
}

/// POST /auth/google - sign in with a Google OAuth access token
pub async fn google_login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<GoogleLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate(&payload).into_result()?;

    let user = state
        .auth
        .verify_identity(Identity::Google(GoogleGrant::AccessToken(
            payload.token.trim().to_string(),
        )))
        .await?;
    let tokens = state.tokens.issue_auth_tokens(&user.id).await?;

    Ok(Json(AuthResponse { user, tokens }))
}

/// GET /auth/google - start the redirect flow
pub async fn google_oauth_start(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Redirect, ApiError> {
    let url = state.auth.google().authorization_url()?;
    info!("Redirecting to Google OAuth consent page");
    Ok(Redirect::to(&url))
}

/// GET /auth/google/callback?code=
pub async fn google_oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(params): ApiQuery<GoogleCallbackQuery>,
) -> Result<Json<AuthResponse>, ApiError> {
    if let Some(error) = params.error {
        warn!(oauth_error = %error, "Google OAuth returned error");
        return Err(ApiError::BadRequest("Google login failed".to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("code: Authorization code is required".to_string()))?;

    let user = state
        .auth
        .verify_identity(Identity::Google(GoogleGrant::AuthorizationCode(code)))
        .await?;
    let tokens = state.tokens.issue_auth_tokens(&user.id).await?;

    Ok(Json(AuthResponse { user, tokens }))
}

/// POST /auth/logout
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<RefreshTokenRequest>,
) -> Result<StatusCode, ApiError> {
    payload.validate(&payload).into_result()?;
    state.auth.logout(payload.refresh_token.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/refresh-tokens - returns a new `{access, refresh}` pair
pub async fn refresh_tokens(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate(&payload).into_result()?;
    let tokens = state.auth.refresh_auth(payload.refresh_token.trim()).await?;
    Ok(Json(tokens))
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    payload.validate(&payload).into_result()?;
    state.auth.forgot_password(&payload.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/reset-password?token=
pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TokenQuery>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    query.validate(&query).into_result()?;
    payload.validate(&payload).into_result()?;
    state
        .auth
        .reset_password(query.token.trim(), &payload.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/set-password
pub async fn set_password(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<SetPasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate(&payload).into_result()?;
    let (user, tokens) = state
        .auth
        .set_password(payload.token.trim(), &payload.password)
        .await?;
    Ok(Json(AuthResponse { user, tokens }))
}

/// POST /auth/send-verification-email
pub async fn send_verification_email(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<StatusCode, ApiError> {
    state.auth.send_verification_email(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/verify-email?token=
pub async fn verify_email(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    query.validate(&query).into_result()?;
    state.auth.verify_email(query.token.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}
