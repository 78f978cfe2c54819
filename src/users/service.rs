use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{NewUser, Role, User, UserFilter, UserUpdate};
use crate::common::{generate_user_id, normalize_email, safe_email_log, ApiError};

const EMAIL_TAKEN: &str = "This email is already being used";
const GOOGLE_ACCOUNT_TAKEN: &str = "This Google account is already linked to another user";

#[derive(Debug, Clone)]
pub struct UserService {
    db: SqlitePool,
    admin_emails: Arc<HashSet<String>>,
}

impl UserService {
    pub fn new(db: SqlitePool, admin_emails: HashSet<String>) -> Self {
        Self {
            db,
            admin_emails: Arc::new(admin_emails),
        }
    }

    /// List users, newest first
    pub async fn get_users(&self, filter: &UserFilter) -> Result<Vec<User>, ApiError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM users WHERE 1 = 1");

        if let Some(name) = &filter.name {
            query.push(" AND name LIKE ").push_bind(format!("%{}%", name));
        }
        if let Some(role) = filter.role {
            query.push(" AND role = ").push_bind(role);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let users = query.build_query_as::<User>().fetch_all(&self.db).await?;
        Ok(users)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
            .bind(google_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    /// Like `get_user_by_id` but a missing row is a 404
    pub async fn require_user(&self, user_id: &str) -> Result<User, ApiError> {
        self.get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Insert a new account. An email already in use is a conflict.
    pub async fn create_user(&self, new: NewUser) -> Result<User, ApiError> {
        let email = normalize_email(&new.email);
        let role = new.role.unwrap_or_else(|| self.default_role_for(&email));
        let now = Utc::now();

        let user = User {
            id: generate_user_id(),
            name: new.name.trim().to_string(),
            email,
            password: new.password,
            google_id: new.google_id,
            email_verified: new.email_verified,
            role,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, google_id, email_verified, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.google_id)
        .bind(user.email_verified)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(conflict_on_unique)?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            role = %user.role,
            "User created"
        );
        Ok(user)
    }

    /// Apply a partial update. Fails with 404 if the user is gone and 400 if the new
    /// email belongs to someone else.
    pub async fn update_user_by_id(&self, user_id: &str, update: UserUpdate) -> Result<User, ApiError> {
        let email = update.email.as_deref().map(normalize_email);
        let name = update.name.as_deref().map(|n| n.trim().to_string());

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                password = COALESCE(?, password),
                google_id = COALESCE(?, google_id),
                email_verified = COALESCE(?, email_verified),
                role = COALESCE(?, role),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(update.password)
        .bind(update.google_id)
        .bind(update.email_verified)
        .bind(update.role)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(conflict_on_unique)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        debug!(user_id = %user_id, "User updated");
        self.require_user(user_id).await
    }

    /// Replace the password hash only if it still equals `expected` (`None` = no password).
    /// Returns false when another request changed it first.
    pub async fn set_password_if_unchanged(
        &self,
        user_id: &str,
        expected: Option<&str>,
        new_hash: &str,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE users SET password = ?, updated_at = ? WHERE id = ? AND password IS ?",
        )
        .bind(new_hash)
        .bind(Utc::now())
        .bind(user_id)
        .bind(expected)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deleting a user cascades to every token row it owns
    pub async fn delete_user_by_id(&self, user_id: &str) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    pub async fn delete_all_users(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.db).await?;
        info!(deleted = result.rows_affected(), "All users deleted");
        Ok(result.rows_affected())
    }

    fn default_role_for(&self, email: &str) -> Role {
        if self.admin_emails.contains(email) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// SQLite names the column in the message: "UNIQUE constraint failed: users.email"
fn conflict_on_unique(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.message().contains("users.google_id") {
                ApiError::Conflict(GOOGLE_ACCOUNT_TAKEN.to_string())
            } else if db.message().contains("users.email") {
                ApiError::Conflict(EMAIL_TAKEN.to_string())
            } else {
                ApiError::Database(e)
            }
        }
        _ => ApiError::Database(e),
    }
}
