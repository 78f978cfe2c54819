//! User data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User database model. The password hash never leaves the server.
#[derive(FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub email_verified: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert values for a new account. `password` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub email_verified: bool,
    pub role: Option<Role>,
}

/// Partial update; `None` leaves the column untouched. `password` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub email_verified: Option<bool>,
    pub role: Option<Role>,
}

/// Filters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub limit: i64,
    pub offset: i64,
}

/// POST /user body
#[derive(Deserialize, Debug, Clone)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// PATCH /user/:userId and PATCH /user/me body
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// GET /user query
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListUsersQuery {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    pub fn into_filter(self) -> UserFilter {
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let page = self.page.unwrap_or(1).max(1);
        UserFilter {
            name: self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            role: self.role,
            limit,
            offset: (page - 1) * limit,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize, Debug)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}
