// Shared fixtures for unit and HTTP tests

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use super::config::AppConfig;
use super::migrations::run_migrations;
use super::state::AppState;
use crate::app::build_router;
use crate::auth::password::hash_password;
use crate::services::email::{MailError, MailTransport};
use crate::services::google::{GoogleError, GoogleIdentityProvider, GoogleProfile};
use crate::services::RateLimitConfig;
use crate::tokens::TokenKind;
use crate::users::models::{NewUser, Role, User};
use crate::users::UserService;

pub const TEST_SECRET: &str = "test_secret_key";
pub const GOOGLE_ACCESS_TOKEN: &str = "google-access-token";
pub const GOOGLE_CODE: &str = "google-auth-code";

/// In-memory database with the real schema. One connection that never closes,
/// so every query sees the same database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

pub fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("APP_ENV", "test"),
        ("JWT_SECRET", TEST_SECRET),
        ("FRONTEND_URL", "http://localhost:4000"),
        ("GOOGLE_CLIENT_ID", "client-id"),
        ("GOOGLE_CLIENT_SECRET", "client-secret"),
    ]);
    AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).expect("test config")
}

pub async fn insert_user(pool: &SqlitePool, email: &str, password_hash: Option<&str>) -> User {
    insert_user_with_role(pool, email, password_hash, Role::User).await
}

pub async fn insert_user_with_role(
    pool: &SqlitePool,
    email: &str,
    password_hash: Option<&str>,
    role: Role,
) -> User {
    UserService::new(pool.clone(), HashSet::new())
        .create_user(NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: password_hash.map(str::to_string),
            role: Some(role),
            ..Default::default()
        })
        .await
        .expect("insert user")
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport that keeps every message in memory
#[derive(Default)]
pub struct CapturingTransport {
    sent: Mutex<Vec<SentMail>>,
}

impl CapturingTransport {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mail lock").clone()
    }

    /// The `token=` query value of the newest message sent to `to`
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .and_then(|mail| mail.body.split("token=").nth(1))
            .map(|rest| rest.split_whitespace().next().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl MailTransport for CapturingTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().expect("mail lock").push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Google stand-in: accepts `GOOGLE_ACCESS_TOKEN` and `GOOGLE_CODE`, rejects the rest
pub struct StubGoogle {
    pub profile: GoogleProfile,
}

impl StubGoogle {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            profile: GoogleProfile {
                sub: "google-sub-1".to_string(),
                email: Some(email.to_string()),
                name: Some(name.to_string()),
                email_verified: true,
            },
        }
    }
}

#[async_trait]
impl GoogleIdentityProvider for StubGoogle {
    async fn userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        if access_token == GOOGLE_ACCESS_TOKEN {
            Ok(self.profile.clone())
        } else {
            Err(GoogleError::Rejected)
        }
    }

    fn authorization_url(&self) -> Result<String, GoogleError> {
        Ok("https://accounts.google.com/o/oauth2/v2/auth?client_id=client-id".to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        if code == GOOGLE_CODE {
            Ok(GOOGLE_ACCESS_TOKEN.to_string())
        } else {
            Err(GoogleError::OAuthFailed("invalid_grant".to_string()))
        }
    }
}

/// Router over a fresh database with captured mail and a stub Google
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mail: Arc<CapturingTransport>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::disabled()).await
    }

    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let mail = Arc::new(CapturingTransport::default());
        let state = AppState::new(
            test_pool().await,
            test_config(),
            mail.clone(),
            Arc::new(StubGoogle::new("gina@example.com", "Gina")),
            rate_limit,
        );
        let router = build_router(state.clone());
        Self { state, router, mail }
    }

    pub async fn user(&self, email: &str, password: Option<&str>, role: Role) -> User {
        let hashed = match password {
            Some(p) => Some(hash_password(p).await.expect("hash")),
            None => None,
        };
        insert_user_with_role(&self.state.db, email, hashed.as_deref(), role).await
    }

    /// Signs in `user_id` and returns the access half of the pair
    pub async fn access_token(&self, user_id: &str) -> String {
        self.state
            .tokens
            .issue_auth_tokens(user_id)
            .await
            .expect("issue tokens")
            .access
            .token
    }

    pub async fn stored_token_count(&self, user_id: &str, kind: TokenKind) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tokens WHERE user_id = ? AND type = ?")
            .bind(user_id)
            .bind(kind)
            .fetch_one(&self.state.db)
            .await
            .expect("count tokens")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        self.request_with_headers(method, uri, body, bearer, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
