// Common validation types, traits and rejection-normalizing extractors

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use super::error::ApiError;

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Turn a failed validation into a 400 `ApiError`.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.into())
        }
    }

    pub fn check_email(&mut self, field: &str, email: &str) {
        if email.is_empty() {
            self.add_error(field, "Email is required");
        } else if email.len() > 128 {
            self.add_error(field, "Email must not exceed 128 characters");
        } else if !email_regex().is_match(email) {
            self.add_error(field, "Email must be a valid email address");
        }
    }

    pub fn check_password(&mut self, field: &str, password: &str) {
        if password.len() < 6 {
            self.add_error(field, "Password must be at least 6 characters");
        } else if password.len() > 128 {
            self.add_error(field, "Password must not exceed 128 characters");
        }
    }

    pub fn check_name(&mut self, field: &str, name: &str) {
        let len = name.chars().count();
        if len < 2 {
            self.add_error(field, "Name must be at least 2 characters");
        } else if len > 128 {
            self.add_error(field, "Name must not exceed 128 characters");
        }
    }

    pub fn check_token(&mut self, field: &str, token: &str) {
        if token.is_empty() {
            self.add_error(field, "Token is required");
        } else if token.len() > 500 {
            self.add_error(field, "Token must not exceed 500 characters");
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// `Json` extractor whose rejections become 400 validation errors
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

/// `Query` extractor whose rejections become 400 validation errors
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| ApiError::Validation(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        let mut result = ValidationResult::new();
        result.check_email("email", "a@x.com");
        assert!(result.is_valid);

        result.check_email("email", "invalid-email");
        result.check_email("email", "");
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_password_bounds() {
        let mut result = ValidationResult::new();
        result.check_password("password", "short");
        result.check_password("password", &"x".repeat(129));
        assert_eq!(result.errors.len(), 2);

        let mut ok = ValidationResult::new();
        ok.check_password("password", "newsecret");
        assert!(ok.is_valid);
    }

    #[test]
    fn test_name_bounds() {
        let mut result = ValidationResult::new();
        result.check_name("name", "a");
        assert!(!result.is_valid);

        let mut ok = ValidationResult::new();
        ok.check_name("name", "Ann");
        assert!(ok.into_result().is_ok());
    }
}
