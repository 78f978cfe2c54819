// Error tracking: Sentry client setup and the tracing layer that feeds it

use tracing::info;

use crate::common::config::{AppConfig, Environment};

fn environment_name(environment: Environment) -> &'static str {
    match environment {
        Environment::Development => "development",
        Environment::Production => "production",
        Environment::Test => "test",
    }
}

/// Initialize Sentry when a DSN is configured. The returned guard flushes pending
/// events on drop, so it must live as long as the server.
pub fn init_sentry(config: &AppConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = match config.sentry_dsn.as_deref() {
        Some(dsn) => dsn,
        None => {
            info!("Sentry DSN not configured, error tracking disabled");
            return None;
        }
    };

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(environment_name(config.environment).into()),
            traces_sample_rate: if config.environment == Environment::Production {
                0.1
            } else {
                0.0
            },
            ..Default::default()
        },
    ));

    info!("Sentry initialized successfully");
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::test_config;

    #[test]
    fn test_no_dsn_means_no_client() {
        let config = test_config();
        assert!(config.sentry_dsn.is_none());
        assert!(init_sentry(&config).is_none());
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(environment_name(Environment::Production), "production");
        assert_eq!(environment_name(Environment::Test), "test");
    }
}
