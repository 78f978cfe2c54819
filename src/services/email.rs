// src/services/email.rs
//! Outbound account emails: verification, password reset and password setup links

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::Region;
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::common::config::{EmailConfig, EmailTransportKind};
use crate::common::{safe_email_log, safe_token_log, ApiError};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SES operation failed: {0}")]
    Ses(String),

    #[error("invalid email content: {0}")]
    Content(String),
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        ApiError::Internal(format!("Failed to send email: {}", e))
    }
}

/// Delivers a plain-text message to one recipient
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub struct SesTransport {
    client: SesClient,
    from: String,
}

impl SesTransport {
    /// Credentials come from the default AWS provider chain
    pub async fn new(from: impl Into<String>, region: impl Into<String>) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;

        Self {
            client: SesClient::new(&aws_config),
            from: from.into(),
        }
    }
}

#[async_trait]
impl MailTransport for SesTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Content(format!("subject: {}", e)))?;

        let body_content = Content::builder()
            .data(body)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Content(format!("body: {}", e)))?;

        let message = Message::builder()
            .subject(subject_content)
            .body(SesBody::builder().text(body_content).build())
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(to), "Failed to send email via SES");
                MailError::Ses(e.to_string())
            })?;

        info!(
            to = %safe_email_log(to),
            message_id = ?result.message_id(),
            "Email sent via SES"
        );
        Ok(())
    }
}

/// Writes emails to the log instead of sending them. Used in development.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let body = mask_link_tokens(body);
        info!(to = %safe_email_log(to), subject = %subject, body = %body, "Email (log transport)");
        Ok(())
    }
}

/// Replace every `token=` value in `text` with its masked form
fn mask_link_tokens(text: &str) -> String {
    let mut parts = text.split("token=");
    let mut masked = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let end = part.find(char::is_whitespace).unwrap_or(part.len());
        masked.push_str("token=");
        masked.push_str(&safe_token_log(&part[..end]));
        masked.push_str(&part[end..]);
    }
    masked
}

/// Build the transport named in the configuration
pub async fn transport_from_config(config: &EmailConfig) -> Arc<dyn MailTransport> {
    match &config.transport {
        EmailTransportKind::Ses { from, region } => Arc::new(SesTransport::new(from, region).await),
        EmailTransportKind::Log => Arc::new(LogTransport),
    }
}

pub struct EmailService {
    transport: Arc<dyn MailTransport>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(transport: Arc<dyn MailTransport>, frontend_url: impl Into<String>) -> Self {
        Self {
            transport,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        self.transport.send(to, subject, text).await
    }

    pub async fn send_verification_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        let url = self.link("verify-email", token);
        let text = format!(
            "Please verify your email by clicking on the following link: {}",
            url
        );
        self.send_email(to, "Email Verification", &text).await
    }

    pub async fn send_reset_password_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        let url = self.link("reset-password", token);
        let text = format!(
            "Please reset your password by clicking on the following link: {}",
            url
        );
        self.send_email(to, "Reset Password", &text).await
    }

    pub async fn send_set_password_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        let url = self.link("set-password", token);
        let text = format!(
            "Welcome! Please set your password by clicking on the following link: {}",
            url
        );
        self.send_email(to, "Set Your Password", &text).await
    }

    fn link(&self, page: &str, token: &str) -> String {
        format!(
            "{}/{}?token={}",
            self.frontend_url,
            page,
            urlencoding::encode(token)
        )
    }
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}
