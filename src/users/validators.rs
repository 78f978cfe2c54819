use super::models::{CreateUserRequest, UpdateUserRequest};
use crate::common::{ValidationResult, Validator};

impl Validator<CreateUserRequest> for CreateUserRequest {
    fn validate(&self, data: &CreateUserRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check_name("name", data.name.trim());
        result.check_email("email", &data.email.trim().to_lowercase());
        result.check_password("password", &data.password);
        result
    }
}

impl Validator<UpdateUserRequest> for UpdateUserRequest {
    fn validate(&self, data: &UpdateUserRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.name.is_none() && data.email.is_none() && data.password.is_none() {
            result.add_error("body", "At least one of name, email or password is required");
        }
        if let Some(name) = &data.name {
            result.check_name("name", name.trim());
        }
        if let Some(email) = &data.email {
            result.check_email("email", &email.trim().to_lowercase());
        }
        if let Some(password) = &data.password {
            result.check_password("password", password);
        }

        result
    }
}
