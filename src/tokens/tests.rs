//! Tests for the token lifecycle
//!
//! These tests drive `TokenService` against an in-memory database:
//! - Issuance, rotation and logout of auth pairs
//! - Single-use tokens and their replay behavior
//! - Expiry, blacklist, ownership and signature failures

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::config::JwtConfig;
    use crate::common::test_support::{insert_user, test_pool, TEST_SECRET};
    use chrono::Duration;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    async fn service_with(config: JwtConfig) -> (TokenService, SqlitePool) {
        let pool = test_pool().await;
        let service = TokenService::new(&config, TokenStore::new(pool.clone()));
        (service, pool)
    }

    async fn service() -> (TokenService, SqlitePool) {
        service_with(JwtConfig::new(TEST_SECRET)).await
    }

    /// Every lifetime already in the past
    fn expired_config() -> JwtConfig {
        JwtConfig {
            access_ttl: Duration::seconds(-20),
            refresh_ttl: Duration::seconds(-10),
            reset_password_ttl: Duration::seconds(-10),
            verify_email_ttl: Duration::seconds(-10),
            set_password_ttl: Duration::seconds(-10),
            ..JwtConfig::new(TEST_SECRET)
        }
    }

    async fn row_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_persists_refresh_only() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();

        assert!(pair.access.expires < pair.refresh.expires);
        assert_ne!(pair.access.token, pair.refresh.token);

        let refresh = tokens.store().find_by_token(&pair.refresh.token).await.unwrap().unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.user_id, user.id);
        assert!(tokens.store().find_by_token(&pair.access.token).await.unwrap().is_none());
        assert_eq!(row_count(&pool).await, 1);

        let claims = tokens.verify_access(&pair.access.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn test_two_pairs_in_same_second_differ() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let first = tokens.issue_auth_tokens(&user.id).await.unwrap();
        let second = tokens.issue_auth_tokens(&user.id).await.unwrap();

        assert_ne!(first.refresh.token, second.refresh.token);
        assert_eq!(row_count(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_refresh_is_not_an_access_token() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();

        assert!(matches!(
            tokens.verify_access(&pair.refresh.token),
            Err(TokenError::WrongKind { .. })
        ));
        assert!(matches!(
            tokens.verify(&pair.refresh.token, TokenKind::ResetPassword).await,
            Err(TokenError::WrongKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotation_consumes_old_refresh() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();

        let rotated = tokens.rotate_refresh(&pair.refresh.token).await.unwrap();
        assert_ne!(rotated.refresh.token, pair.refresh.token);
        assert!(tokens.verify(&rotated.refresh.token, TokenKind::Refresh).await.is_ok());

        let again = tokens.rotate_refresh(&pair.refresh.token).await;
        assert!(matches!(again, Err(TokenError::NotFound)));
        assert_eq!(row_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_one_winner() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();
        let tokens = Arc::new(tokens);

        let (a, b) = tokio::join!(
            tokens.rotate_refresh(&pair.refresh.token),
            tokens.rotate_refresh(&pair.refresh.token)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(row_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_expired_tokens_are_rejected() {
        let (tokens, pool) = service_with(expired_config()).await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();

        assert!(matches!(tokens.verify_access(&pair.access.token), Err(TokenError::Expired)));
        assert!(matches!(
            tokens.rotate_refresh(&pair.refresh.token).await,
            Err(TokenError::Expired)
        ));

        let reset = tokens
            .issue_single_use_token(TokenKind::ResetPassword, &user.id)
            .await
            .unwrap();
        assert!(matches!(
            tokens.consume_single_use_token(&reset, TokenKind::ResetPassword).await,
            Err(TokenError::Expired)
        ));

        let set = tokens.issue_password_token("Ann", "ann@example.com").unwrap();
        assert!(matches!(
            tokens.consume_single_use_token(&set, TokenKind::SetPassword).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_foreign_secret_is_invalid_signature() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let now = chrono::Utc::now().timestamp();
        let forged = codec::TokenCodec::new("another_secret")
            .sign(&Claims::new(&user.id, now, now + 3600, TokenKind::Access))
            .unwrap();
        assert!(matches!(
            tokens.verify_access(&forged),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(tokens.verify_access("not-a-token"), Err(TokenError::Malformed)));
    }

    #[tokio::test]
    async fn test_owner_mismatch_is_rejected() {
        let (tokens, pool) = service().await;
        let ann = insert_user(&pool, "ann@example.com", None).await;
        let bob = insert_user(&pool, "bob@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&ann.id).await.unwrap();

        sqlx::query("UPDATE tokens SET user_id = ? WHERE token = ?")
            .bind(&bob.id)
            .bind(&pair.refresh.token)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            tokens.verify(&pair.refresh.token, TokenKind::Refresh).await,
            Err(TokenError::OwnerMismatch)
        ));
    }

    #[tokio::test]
    async fn test_blacklisted_token_is_rejected() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let pair = tokens.issue_auth_tokens(&user.id).await.unwrap();

        tokens.blacklist(&pair.refresh.token).await.unwrap();

        assert!(matches!(
            tokens.rotate_refresh(&pair.refresh.token).await,
            Err(TokenError::Blacklisted)
        ));
        assert!(matches!(tokens.blacklist("missing").await, Err(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_single_use_token_works_once() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let token = tokens
            .issue_single_use_token(TokenKind::VerifyEmail, &user.id)
            .await
            .unwrap();

        match tokens.consume_single_use_token(&token, TokenKind::VerifyEmail).await.unwrap() {
            SingleUseToken::Persisted(record) => assert_eq!(record.user_id, user.id),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            tokens.consume_single_use_token(&token, TokenKind::VerifyEmail).await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_new_single_use_token_replaces_older() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let first = tokens
            .issue_single_use_token(TokenKind::ResetPassword, &user.id)
            .await
            .unwrap();
        let second = tokens
            .issue_single_use_token(TokenKind::ResetPassword, &user.id)
            .await
            .unwrap();

        assert!(matches!(
            tokens.consume_single_use_token(&first, TokenKind::ResetPassword).await,
            Err(TokenError::NotFound)
        ));
        assert!(tokens
            .consume_single_use_token(&second, TokenKind::ResetPassword)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_single_use_kind_must_match() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;

        let token = tokens
            .issue_single_use_token(TokenKind::VerifyEmail, &user.id)
            .await
            .unwrap();

        assert!(matches!(
            tokens.consume_single_use_token(&token, TokenKind::ResetPassword).await,
            Err(TokenError::WrongKind { .. })
        ));
        assert!(tokens
            .issue_single_use_token(TokenKind::Refresh, &user.id)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_password_token_carries_identity() {
        let (tokens, _pool) = service().await;

        let token = tokens.issue_password_token("Ann", "ann@example.com").unwrap();

        match tokens.consume_single_use_token(&token, TokenKind::SetPassword).await.unwrap() {
            SingleUseToken::SelfContained(claims) => {
                assert_eq!(claims.name, "Ann");
                assert_eq!(claims.email, "ann@example.com");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logout_revokes_only_that_refresh() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        let laptop = tokens.issue_auth_tokens(&user.id).await.unwrap();
        let phone = tokens.issue_auth_tokens(&user.id).await.unwrap();

        tokens.revoke_refresh(&laptop.refresh.token).await.unwrap();

        assert!(tokens.revoke_refresh(&laptop.refresh.token).await.is_ok());
        assert!(matches!(
            tokens.rotate_refresh(&laptop.refresh.token).await,
            Err(TokenError::NotFound)
        ));
        assert!(tokens.rotate_refresh(&phone.refresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_keeps_verify_email_tokens() {
        let (tokens, pool) = service().await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        tokens.issue_auth_tokens(&user.id).await.unwrap();
        tokens.issue_auth_tokens(&user.id).await.unwrap();
        tokens
            .issue_single_use_token(TokenKind::ResetPassword, &user.id)
            .await
            .unwrap();
        let verify = tokens
            .issue_single_use_token(TokenKind::VerifyEmail, &user.id)
            .await
            .unwrap();

        let revoked = tokens.revoke_all_for_user(&user.id).await.unwrap();

        assert_eq!(revoked, 3);
        assert_eq!(row_count(&pool).await, 1);
        assert!(tokens.verify(&verify, TokenKind::VerifyEmail).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_task_purges_expired_rows() {
        let (tokens, pool) = service_with(expired_config()).await;
        let user = insert_user(&pool, "ann@example.com", None).await;
        tokens.issue_auth_tokens(&user.id).await.unwrap();
        assert_eq!(row_count(&pool).await, 1);

        let handle = start_cleanup_task(Arc::new(tokens), std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(row_count(&pool).await, 0);
    }

    #[test]
    fn test_token_errors_map_to_statuses() {
        use crate::common::ApiError;
        use axum::http::StatusCode;

        let status = |e: TokenError| ApiError::from(e).status();
        assert_eq!(status(TokenError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(TokenError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(TokenError::Blacklisted), StatusCode::UNAUTHORIZED);
        assert_eq!(status(TokenError::InvalidSignature), StatusCode::UNAUTHORIZED);
        assert_eq!(status(TokenError::DuplicateToken), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
