// rate_limit_middleware.rs
use crate::services::rate_limit::{RateLimitResult, RateLimitService};
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RateLimitErrorResponse {
    error: String,
    code: String,
    retry_after: u32,
}

/// Extract IP address from request.
///
/// Forwarding headers are client-controlled unless a proxy rewrites them, so they
/// are read only when `trust_proxy_headers` is set.
fn extract_ip_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<String> {
    if trust_proxy_headers {
        // Take the first IP in the chain
        if let Some(forwarded) = headers.get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    return Some(first_ip.trim().to_string());
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                return Some(ip_str.to_string());
            }
        }
    }

    connect_info.map(|info| info.0.ip().to_string())
}

/// Throttles clients with too many failed authentication attempts.
///
/// Every response with status >= 400 counts as a failure for the client IP.
pub async fn auth_rate_limit_middleware(
    Extension(rate_limit_service): Extension<Arc<RateLimitService>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip_address = extract_ip_address(
        request.headers(),
        connect_info.as_ref(),
        rate_limit_service.trusts_proxy_headers(),
    )
        .unwrap_or_else(|| "unknown".to_string());
    let path = request.uri().path().to_string();

    if let RateLimitResult::Limited { retry_after } = rate_limit_service.check(&ip_address).await {
        warn!(
            ip = %ip_address,
            path = %path,
            retry_after = retry_after,
            "Request blocked by auth rate limiter"
        );
        return limited_response(retry_after);
    }

    let response = next.run(request).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        rate_limit_service.record_failure(&ip_address).await;
    } else {
        debug!(ip = %ip_address, path = %path, "Auth request succeeded");
    }

    response
}

fn limited_response(retry_after: u32) -> Response {
    let error_response = RateLimitErrorResponse {
        error: "Too many failed attempts, please try again later".to_string(),
        code: "TOO_MANY_REQUESTS".to_string(),
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error_response)).into_response();

    if let Ok(retry_header) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("retry-after", retry_header);
    }

    response
}
