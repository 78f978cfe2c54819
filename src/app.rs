// src/app.rs
//! Router composition shared by the server and the HTTP tests

use axum::{
    extract::Extension,
    http::{header, HeaderName, HeaderValue, Method, Uri},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::common::{ApiError, AppState};
use crate::{auth, logging_middleware, users};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let rate_limit = state.rate_limit.clone();
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(health))
        .merge(auth::auth_routes())
        .merge(users::user_routes())
        .fallback(not_found)
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(rate_limit))
        .layer(Extension(shared))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

/// GET /health
async fn health(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Cannot {} {}", method, uri.path()))
}
