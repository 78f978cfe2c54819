//! Durable record of outstanding persisted tokens

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, error};

use super::models::{StoredToken, TokenKind};
use super::service::TokenError;
use crate::common::generate_token_id;

/// Values of a token row about to be inserted
#[derive(Debug, Clone)]
pub struct NewToken<'a> {
    pub token: &'a str,
    pub user_id: &'a str,
    pub expires_at: DateTime<Utc>,
    pub kind: TokenKind,
    pub blacklisted: bool,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, new: NewToken<'_>) -> Result<StoredToken, TokenError> {
        insert_token(&self.pool, &new).await
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<StoredToken>, TokenError> {
        let row = sqlx::query_as::<_, StoredToken>("SELECT * FROM tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Returns whether a row was removed. Deleting a missing token is not an error.
    pub async fn delete(&self, token: &str) -> Result<bool, TokenError> {
        let result = sqlx::query("DELETE FROM tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool, TokenError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk revocation of every row a user owns
    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, TokenError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_user_by_kind(
        &self,
        user_id: &str,
        kind: TokenKind,
    ) -> Result<u64, TokenError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = ? AND type = ?")
            .bind(user_id)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_blacklisted(&self, token: &str, blacklisted: bool) -> Result<bool, TokenError> {
        let result = sqlx::query("UPDATE tokens SET blacklisted = ? WHERE token = ?")
            .bind(blacklisted)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Atomically delete `old_token` and insert `replacement`.
    ///
    /// The delete is conditional on the old row still existing with the same kind, so
    /// of two concurrent rotations exactly one commits; the other gets `NotFound`.
    pub async fn replace(
        &self,
        old_token: &str,
        replacement: NewToken<'_>,
    ) -> Result<StoredToken, TokenError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM tokens WHERE token = ? AND type = ?")
            .bind(old_token)
            .bind(replacement.kind)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            debug!(kind = %replacement.kind, "Token already consumed, aborting replacement");
            tx.rollback().await?;
            return Err(TokenError::NotFound);
        }

        let stored = insert_token(&mut *tx, &replacement).await?;
        tx.commit().await.map_err(|e| {
            error!(error = %e, user_id = %replacement.user_id, "Failed to commit token replacement");
            TokenError::Database(e)
        })?;

        Ok(stored)
    }
}

async fn insert_token<'e, E>(executor: E, new: &NewToken<'_>) -> Result<StoredToken, TokenError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let stored = StoredToken {
        id: generate_token_id(),
        token: new.token.to_string(),
        kind: new.kind,
        user_id: new.user_id.to_string(),
        expires_at: new.expires_at,
        blacklisted: new.blacklisted,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO tokens (id, token, type, user_id, expires_at, blacklisted, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stored.id)
    .bind(&stored.token)
    .bind(stored.kind)
    .bind(&stored.user_id)
    .bind(stored.expires_at)
    .bind(stored.blacklisted)
    .bind(stored.created_at)
    .execute(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => TokenError::DuplicateToken,
        _ => TokenError::Database(e),
    })?;

    Ok(stored)
}
