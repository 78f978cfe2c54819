use super::models::{
    ForgotPasswordRequest, GoogleLoginRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, SetPasswordRequest, TokenQuery,
};
use crate::common::{ValidationResult, Validator};

impl Validator<RegisterRequest> for RegisterRequest {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_name("name", data.name.trim());
        result.check_email("email", &data.email.trim().to_lowercase());
        if let Some(password) = &data.password {
            result.check_password("password", password);
        }
        result
    }
}

impl Validator<LoginRequest> for LoginRequest {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_email("email", &data.email.trim().to_lowercase());
        result.check_password("password", &data.password);
        result
    }
}

impl Validator<GoogleLoginRequest> for GoogleLoginRequest {
    fn validate(&self, data: &GoogleLoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_token("token", data.token.trim());
        result
    }
}

impl Validator<RefreshTokenRequest> for RefreshTokenRequest {
    fn validate(&self, data: &RefreshTokenRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_token("refreshToken", data.refresh_token.trim());
        result
    }
}

impl Validator<ForgotPasswordRequest> for ForgotPasswordRequest {
    fn validate(&self, data: &ForgotPasswordRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_email("email", &data.email.trim().to_lowercase());
        result
    }
}

impl Validator<SetPasswordRequest> for SetPasswordRequest {
    fn validate(&self, data: &SetPasswordRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_token("token", data.token.trim());
        result.check_password("password", &data.password);
        result
    }
}

impl Validator<ResetPasswordRequest> for ResetPasswordRequest {
    fn validate(&self, data: &ResetPasswordRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_password("password", &data.password);
        result
    }
}

impl Validator<TokenQuery> for TokenQuery {
    fn validate(&self, data: &TokenQuery) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_token("token", data.token.trim());
        result
    }
}
