// src/main.rs
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod app;
mod auth;
mod common;
mod logging_middleware;
mod rate_limit_middleware;
mod services;
mod tokens;
mod users;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::config::{AppConfig, Environment};
use common::error::configure_error_environment;
use common::AppState;
use services::email::transport_from_config;
use services::{init_sentry, GoogleService, RateLimitConfig};

const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer())
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env()?;
    configure_error_environment(config.environment);
    let _sentry = init_sentry(&config);

    info!(
        environment = ?config.environment,
        admin_emails = config.admin_emails.len(),
        "Configuration loaded"
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().no_proxy().build()?;

    let google_service = GoogleService::new(http_client, config.google.clone());
    info!("GoogleService initialized");

    let mail = transport_from_config(&config.email).await;
    info!("Mail transport initialized");

    let rate_limit = if config.environment == Environment::Test {
        RateLimitConfig::disabled()
    } else {
        RateLimitConfig::from_env()
    };

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let port = config.port;
    let app_state = AppState::new(
        pool,
        config,
        mail,
        std::sync::Arc::new(google_service),
        rate_limit,
    );

    // ========================================================================
    // BACKGROUND TASKS
    // ========================================================================

    tokens::start_cleanup_task(app_state.tokens.clone(), TOKEN_CLEANUP_INTERVAL);
    info!("Token cleanup task started");

    let limiter = app_state.rate_limit.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup_expired().await;
        }
    });

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let app = app::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
