// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use super::config::AppConfig;
use crate::auth::AuthService;
use crate::services::{
    EmailService, GoogleIdentityProvider, MailTransport, RateLimitConfig, RateLimitService,
};
use crate::tokens::{TokenService, TokenStore};
use crate::users::UserService;

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub email: Arc<EmailService>,
    pub rate_limit: Arc<RateLimitService>,
}

impl AppState {
    /// Wire every service on top of one pool. Transports are injected so tests can capture mail
    /// and stub Google.
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        mail: Arc<dyn MailTransport>,
        google: Arc<dyn GoogleIdentityProvider>,
        rate_limit: RateLimitConfig,
    ) -> Self {
        let users = UserService::new(db.clone(), config.admin_emails.clone());
        let tokens = Arc::new(TokenService::new(&config.jwt, TokenStore::new(db.clone())));
        let email = Arc::new(EmailService::new(mail, config.email.frontend_url.clone()));
        let auth = AuthService::new(users.clone(), tokens.clone(), email.clone(), google);

        Self {
            db,
            config: Arc::new(config),
            users,
            tokens,
            auth,
            email,
            rate_limit: Arc::new(RateLimitService::new(rate_limit)),
        }
    }
}
