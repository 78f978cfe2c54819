// src/services/mod.rs
//
// Shared services used by the domain modules: outbound email, the Google
// identity provider, the auth failure limiter and error tracking

pub mod email;
pub mod google;
pub mod monitoring;
pub mod rate_limit;

// Re-export commonly used types for convenience
pub use email::{EmailService, MailError, MailTransport};
pub use google::{GoogleError, GoogleIdentityProvider, GoogleProfile, GoogleService};
pub use monitoring::init_sentry;
pub use rate_limit::{RateLimitConfig, RateLimitService};
