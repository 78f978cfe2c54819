//! Authorization gate: bearer extraction, access token verification and role checks

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::identity::Identity;
use super::roles::{role_allows, Action};
use crate::common::{ApiError, AppState};
use crate::users::models::User;

/// The user resolved from the bearer token of the current request
#[derive(Debug, Clone)]
pub struct AuthedUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Authenticate the caller and, when `action` is given, check that their role grants it.
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: Option<Action>,
) -> Result<User, ApiError> {
    let token = match bearer_token(headers) {
        Some(token) => token,
        None => {
            warn!("Authentication failed: missing Authorization header");
            return Err(ApiError::Unauthorized("Please authenticate".to_string()));
        }
    };

    let user = state
        .auth
        .verify_identity(Identity::Bearer(token.to_string()))
        .await?;

    if let Some(action) = action {
        if !role_allows(user.role, action) {
            warn!(
                user_id = %user.id,
                role = %user.role,
                action = %action,
                "Authorization failed: role lacks action"
            );
            return Err(ApiError::Forbidden("Forbidden".to_string()));
        }
    }

    debug!(user_id = %user.id, action = ?action.map(|a| a.as_str()), "Request authorized");
    Ok(user)
}

/// Route layer that requires `action`. Use with `middleware::from_fn_with_state(action, require_action)`.
///
/// The resolved user is stored in the request extensions for `AuthedUser` to pick up.
pub async fn require_action(
    State(action): State<Action>,
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authorize(&state, request.headers(), Some(action)).await?;
    request.extensions_mut().insert(AuthedUser(user));
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(authed) = parts.extensions.get::<AuthedUser>() {
            return Ok(authed.clone());
        }

        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Internal("missing app state".to_string()))?;

        let user = authorize(&app_state, &parts.headers, None).await?;
        Ok(AuthedUser(user))
    }
}
