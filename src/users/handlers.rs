//! User management handlers

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::models::{
    CreateUserRequest, ListUsersQuery, MessageResponse, NewUser, UpdateUserRequest, User,
    UserResponse, UserUpdate, UsersResponse,
};
use crate::auth::password::hash_password;
use crate::auth::AuthedUser;
use crate::common::{ApiError, ApiJson, ApiQuery, AppState, Validator};

async fn into_update(payload: UpdateUserRequest) -> Result<UserUpdate, ApiError> {
    let password = match payload.password {
        Some(plain) => Some(hash_password(&plain).await?),
        None => None,
    };
    Ok(UserUpdate {
        name: payload.name,
        email: payload.email,
        password,
        ..Default::default()
    })
}

/// Update a user. A new password ends every session the user had.
async fn apply_update(
    state: &AppState,
    user_id: &str,
    payload: UpdateUserRequest,
) -> Result<User, ApiError> {
    let password_changed = payload.password.is_some();
    let user = state
        .users
        .update_user_by_id(user_id, into_update(payload).await?)
        .await?;

    if password_changed {
        state.tokens.revoke_all_for_user(&user.id).await?;
    }
    Ok(user)
}

/// GET /user
pub async fn get_users(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.users.get_users(&query.into_filter()).await?;
    Ok(Json(UsersResponse { users }))
}

/// POST /user
pub async fn create_user(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate(&payload).into_result()?;

    let hashed = hash_password(&payload.password).await?;
    let user = state
        .users
        .create_user(NewUser {
            name: payload.name,
            email: payload.email,
            password: Some(hashed),
            role: payload.role,
            ..Default::default()
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// DELETE /user
pub async fn delete_all_users(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.users.delete_all_users().await?;
    Ok(Json(MessageResponse {
        message: "All users dropped".to_string(),
    }))
}

/// GET /user/:userId
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.require_user(&user_id).await?;
    Ok(Json(UserResponse { user }))
}

/// PATCH /user/:userId
pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate(&payload).into_result()?;
    let user = apply_update(&state, &user_id, payload).await?;
    Ok(Json(UserResponse { user }))
}

/// DELETE /user/:userId
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.users.delete_user_by_id(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /user/me - the caller's own account
pub async fn get_me(AuthedUser(user): AuthedUser) -> Json<User> {
    Json(user)
}

/// PATCH /user/me
pub async fn update_me(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(me): AuthedUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate(&payload).into_result()?;
    let user = apply_update(&state, &me.id, payload).await?;
    Ok(Json(UserResponse { user }))
}

/// DELETE /user/me
pub async fn delete_me(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(me): AuthedUser,
) -> Result<StatusCode, ApiError> {
    state.users.delete_user_by_id(&me.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
