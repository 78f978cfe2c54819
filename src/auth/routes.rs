//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::rate_limit_middleware::auth_rate_limit_middleware;

/// Creates and returns the authentication router
///
/// Every route sits behind the failed-attempt limiter.
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route(
            "/auth/google",
            get(handlers::google_oauth_start).post(handlers::google_login),
        )
        .route("/auth/google/callback", get(handlers::google_oauth_callback))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/refresh-tokens", post(handlers::refresh_tokens))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/set-password", post(handlers::set_password))
        .route(
            "/auth/send-verification-email",
            post(handlers::send_verification_email),
        )
        .route("/auth/verify-email", post(handlers::verify_email))
        .route_layer(middleware::from_fn(auth_rate_limit_middleware))
}
