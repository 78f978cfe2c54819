// src/services/google.rs
//! Google as an OAuth relying party: userinfo lookup and the authorization code flow

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::common::config::GoogleConfig;
use crate::common::ApiError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("Google rejected the access token")]
    Rejected,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<GoogleError> for ApiError {
    fn from(e: GoogleError) -> Self {
        match e {
            GoogleError::OAuthFailed(_) | GoogleError::Rejected | GoogleError::SerializationError(_) => {
                ApiError::BadRequest("Google login failed".to_string())
            }
            GoogleError::NotConfigured | GoogleError::RequestFailed(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

/// Subset of the OpenID userinfo document we rely on
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
}

#[async_trait]
pub trait GoogleIdentityProvider: Send + Sync {
    /// Resolve a Google OAuth access token to the account behind it
    async fn userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError>;

    /// Consent page URL for the redirect flow
    fn authorization_url(&self) -> Result<String, GoogleError>;

    /// Trade an authorization code for a Google access token
    async fn exchange_code(&self, code: &str) -> Result<String, GoogleError>;
}

pub struct GoogleService {
    client: Client,
    config: GoogleConfig,
}

impl GoogleService {
    pub fn new(client: Client, config: GoogleConfig) -> Self {
        Self { client, config }
    }

    fn credentials(&self) -> Result<(&str, &str), GoogleError> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(GoogleError::NotConfigured),
        }
    }
}

#[async_trait]
impl GoogleIdentityProvider for GoogleService {
    async fn userinfo(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = USERINFO_URL, "HTTP error contacting Google userinfo");
                GoogleError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        debug!(http_status = %status, "Received response from Google userinfo");

        match status {
            s if s.is_success() => response
                .json::<GoogleProfile>()
                .await
                .map_err(|e| GoogleError::SerializationError(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(http_status = %status, "Google userinfo rejected the access token");
                Err(GoogleError::Rejected)
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                warn!(http_status = %status, body = %text, "Google userinfo returned an error");
                Err(GoogleError::OAuthFailed(format!("HTTP {}", status)))
            }
        }
    }

    fn authorization_url(&self) -> Result<String, GoogleError> {
        let (client_id, _) = self.credentials()?;

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            AUTHORIZE_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode("openid email profile"),
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, GoogleError> {
        let (client_id, client_secret) = self.credentials()?;

        let params = [
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging Google authorization code");

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Google code exchange failed");
            return Err(GoogleError::OAuthFailed(format!("HTTP {}: {}", status, error_text)));
        }

        let token = response
            .json::<CodeExchangeResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        Ok(token.access_token)
    }
}
