// Application configuration loaded once from the environment

use chrono::Duration;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("access token lifetime ({access_minutes} min) must be shorter than refresh token lifetime ({refresh_minutes} min)")]
    TokenLifetimes {
        access_minutes: i64,
        refresh_minutes: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(()),
        }
    }
}

/// Lifetimes and signing secret for every token kind
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_password_ttl: Duration,
    pub verify_email_ttl: Duration,
    pub set_password_ttl: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(30),
            reset_password_ttl: Duration::minutes(10),
            verify_email_ttl: Duration::minutes(10),
            set_password_ttl: Duration::minutes(60),
        }
    }

    /// Access tokens are unrevocable, so they must never outlive refresh tokens.
    pub fn check_lifetimes(&self) -> Result<(), ConfigError> {
        if self.access_ttl >= self.refresh_ttl {
            return Err(ConfigError::TokenLifetimes {
                access_minutes: self.access_ttl.num_minutes(),
                refresh_minutes: self.refresh_ttl.num_minutes(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTransportKind {
    Ses { from: String, region: String },
    Log,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub transport: EmailTransportKind,
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
    pub email: EmailConfig,
    pub admin_emails: HashSet<String>,
    pub cors_origins: Vec<String>,
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("APP_ENV") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "APP_ENV", value })?,
            None => Environment::Development,
        };

        let port = parse_or(&get, "PORT", 3000u16)?;
        let database_url = get("DATABASE_URL").unwrap_or_else(|| "sqlite://auth_api.db".to_string());

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let jwt = JwtConfig {
            secret,
            access_ttl: lifetime(&get, "JWT_ACCESS_EXPIRATION_MINUTES", 30, Duration::try_minutes)?,
            refresh_ttl: lifetime(&get, "JWT_REFRESH_EXPIRATION_DAYS", 30, Duration::try_days)?,
            reset_password_ttl: lifetime(
                &get,
                "JWT_RESET_PASSWORD_EXPIRATION_MINUTES",
                10,
                Duration::try_minutes,
            )?,
            verify_email_ttl: lifetime(
                &get,
                "JWT_VERIFY_EMAIL_EXPIRATION_MINUTES",
                10,
                Duration::try_minutes,
            )?,
            set_password_ttl: lifetime(
                &get,
                "JWT_SET_PASSWORD_EXPIRATION_MINUTES",
                60,
                Duration::try_minutes,
            )?,
        };
        jwt.check_lifetimes()?;

        let google = GoogleConfig {
            client_id: get("GOOGLE_CLIENT_ID"),
            client_secret: get("GOOGLE_CLIENT_SECRET"),
            redirect_uri: get("GOOGLE_OAUTH_REDIRECT_URI")
                .unwrap_or_else(|| format!("http://localhost:{}/auth/google/callback", port)),
        };

        // The log transport prints live links, so production must send for real
        let transport = match get("EMAIL_TRANSPORT").as_deref() {
            None if environment == Environment::Production => {
                return Err(ConfigError::Missing("EMAIL_TRANSPORT"))
            }
            Some("log") if environment == Environment::Production => {
                return Err(ConfigError::Invalid {
                    key: "EMAIL_TRANSPORT",
                    value: "log".to_string(),
                })
            }
            None | Some("log") => EmailTransportKind::Log,
            Some("ses") => EmailTransportKind::Ses {
                from: get("EMAIL_FROM").ok_or(ConfigError::Missing("EMAIL_FROM"))?,
                region: get("SES_REGION").ok_or(ConfigError::Missing("SES_REGION"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EMAIL_TRANSPORT",
                    value: other.to_string(),
                })
            }
        };
        let email = EmailConfig {
            transport,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:4000".to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        // Accounts created with one of these emails get the ADMIN role
        let admin_emails = get("ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| {
                "http://localhost:3000,http://localhost:4000,http://localhost:5173".to_string()
            })
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            environment,
            port,
            database_url,
            jwt,
            google,
            email,
            admin_emails,
            cors_origins,
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Longest lifetime any token kind may be configured with
const MAX_TOKEN_LIFETIME_DAYS: i64 = 3650;

/// A token lifetime: positive, and no longer than `MAX_TOKEN_LIFETIME_DAYS`.
fn lifetime<F>(
    get: &F,
    key: &'static str,
    default: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let amount: i64 = parse_or(get, key, default)?;
    match unit(amount) {
        Some(ttl) if amount > 0 && ttl <= Duration::days(MAX_TOKEN_LIFETIME_DAYS) => Ok(ttl),
        _ => Err(ConfigError::Invalid {
            key,
            value: amount.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_secret() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 3000);
        assert_eq!(config.jwt.access_ttl, Duration::minutes(30));
        assert_eq!(config.jwt.refresh_ttl, Duration::days(30));
        assert_eq!(config.email.transport, EmailTransportKind::Log);
        assert_eq!(config.email.frontend_url, "http://localhost:4000");
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_access_must_be_shorter_than_refresh() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_ACCESS_EXPIRATION_MINUTES", "2880"),
            ("JWT_REFRESH_EXPIRATION_DAYS", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::TokenLifetimes { .. }));
    }

    #[test]
    fn test_non_positive_lifetimes_are_rejected() {
        for value in ["0", "-5"] {
            let err = AppConfig::from_lookup(lookup(&[
                ("JWT_SECRET", "s3cret"),
                ("JWT_ACCESS_EXPIRATION_MINUTES", value),
            ]))
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key: "JWT_ACCESS_EXPIRATION_MINUTES",
                    value: value.to_string()
                }
            );
        }

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_SET_PASSWORD_EXPIRATION_MINUTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "JWT_SET_PASSWORD_EXPIRATION_MINUTES", .. }
        ));
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_REFRESH_EXPIRATION_DAYS", "999999999999"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "JWT_REFRESH_EXPIRATION_DAYS",
                value: "999999999999".to_string()
            }
        );

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_REFRESH_EXPIRATION_DAYS", "3651"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_REFRESH_EXPIRATION_DAYS", "3650"),
        ]))
        .unwrap();
        assert_eq!(config.jwt.refresh_ttl, Duration::days(3650));
    }

    #[test]
    fn test_ses_transport_requires_sender() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("EMAIL_TRANSPORT", "ses"),
            ("SES_REGION", "eu-west-1"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("EMAIL_FROM"));
    }

    #[test]
    fn test_production_requires_ses_transport() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("APP_ENV", "production"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("EMAIL_TRANSPORT"));

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("APP_ENV", "production"),
            ("EMAIL_TRANSPORT", "log"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "EMAIL_TRANSPORT",
                value: "log".to_string()
            }
        );

        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("APP_ENV", "production"),
            ("EMAIL_TRANSPORT", "ses"),
            ("EMAIL_FROM", "no-reply@example.com"),
            ("SES_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert!(matches!(config.email.transport, EmailTransportKind::Ses { .. }));
    }

    #[test]
    fn test_admin_emails_are_normalized() {
        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("ADMIN_EMAILS", " Root@Example.com , ,ops@example.com"),
        ]))
        .unwrap();
        assert!(config.admin_emails.contains("root@example.com"));
        assert!(config.admin_emails.contains("ops@example.com"));
        assert_eq!(config.admin_emails.len(), 2);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret"), ("PORT", "http")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "http".to_string()
            }
        );
    }
}
