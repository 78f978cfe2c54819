// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode.
//! Credentials and tokens are replaced before anything is logged.

use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::debug;

const REDACTED_FIELDS: [&str; 3] = ["password", "token", "refreshToken"];
const REDACTED: &str = "[REDACTED]";

/// Bodies above this size, or of unknown size, pass through without being buffered.
/// Matches axum's default request body limit.
const MAX_LOGGED_BODY: usize = 2 * 1024 * 1024;

/// Replace secret fields at any depth
fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Loggable rendering of a body. Non-JSON bodies are reported by size only.
fn render_body(bytes: &Bytes) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            redact(&mut json);
            json.to_string()
        }
        Err(_) => format!("<{} bytes>", bytes.len()),
    }
}

fn fits_log_limit(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_LOGGED_BODY as u64)
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let request = if fits_log_limit(request.body()) {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_LOGGED_BODY)
            .await
            .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

        if !bytes.is_empty() {
            debug!(
                method = %parts.method,
                uri = %parts.uri.path(),
                request_body = %render_body(&bytes),
                "Request"
            );
        }
        Request::from_parts(parts, Body::from(bytes))
    } else {
        debug!(method = %request.method(), uri = %request.uri().path(), "Request body not logged");
        request
    };

    let response = next.run(request).await;
    if !fits_log_limit(response.body()) {
        debug!(status = %response.status(), "Response body not logged");
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_LOGGED_BODY)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        debug!(
            status = %parts.status,
            response_body = %render_body(&bytes),
            "Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
