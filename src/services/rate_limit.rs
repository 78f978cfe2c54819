// src/services/rate_limit.rs
//! Per-client limiter for failed authentication attempts.
//!
//! Only failures count: a client that keeps logging in successfully is never throttled.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_failures: u32,
    pub window_seconds: u32,
    pub whitelist_ips: Vec<String>,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP`. Only safe behind a proxy that sets them.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failures: 5,      // 5 failed attempts
            window_seconds: 900,  // per 15 minutes
            whitelist_ips: Vec::new(),
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // RATE_LIMIT_ENABLED - set to "false" to disable rate limiting
        if let Ok(enabled) = env::var("RATE_LIMIT_ENABLED") {
            config.enabled = enabled.to_lowercase() != "false";
        }

        // RATE_LIMIT_MAX_FAILURES - failed attempts allowed per window
        if let Ok(limit) = env::var("RATE_LIMIT_MAX_FAILURES") {
            if let Ok(val) = limit.parse::<u32>() {
                config.max_failures = val;
            }
        }

        // RATE_LIMIT_WINDOW_SECONDS - time window in seconds
        if let Ok(window) = env::var("RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(val) = window.parse::<u32>() {
                config.window_seconds = val;
            }
        }

        // RATE_LIMIT_WHITELIST_IPS - comma-separated list of whitelisted IPs
        if let Ok(whitelist) = env::var("RATE_LIMIT_WHITELIST_IPS") {
            config.whitelist_ips = whitelist
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // RATE_LIMIT_TRUST_PROXY - set to "true" when running behind a reverse proxy
        if let Ok(trust) = env::var("RATE_LIMIT_TRUST_PROXY") {
            config.trust_proxy_headers = trust.to_lowercase() == "true";
        }

        config
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds as u64)
    }
}

#[derive(Debug, Clone)]
struct FailureWindow {
    count: u32,
    window_start: Instant,
}

impl FailureWindow {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = Instant::now();
    }

    fn is_expired(&self, window_duration: Duration) -> bool {
        self.window_start.elapsed() > window_duration
    }
}

#[derive(Debug, PartialEq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u32 },
}

#[derive(Debug, Clone)]
pub struct RateLimitService {
    config: RateLimitConfig,
    failures: Arc<RwLock<HashMap<String, FailureWindow>>>,
}

impl RateLimitService {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            enabled = config.enabled,
            max_failures = config.max_failures,
            window_seconds = config.window_seconds,
            whitelist_ips = ?config.whitelist_ips,
            trust_proxy_headers = config.trust_proxy_headers,
            "Initializing RateLimitService"
        );
        Self {
            config,
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.config.trust_proxy_headers
    }

    fn is_whitelisted(&self, ip: &str) -> bool {
        self.config.whitelist_ips.iter().any(|allowed| allowed == ip)
    }

    /// Whether `ip` may attempt another authentication request
    pub async fn check(&self, ip: &str) -> RateLimitResult {
        if !self.config.enabled || self.is_whitelisted(ip) {
            return RateLimitResult::Allowed;
        }

        let window_duration = self.config.window();
        let limiter = self.failures.read().await;

        match limiter.get(ip) {
            Some(state) if !state.is_expired(window_duration) && state.count >= self.config.max_failures => {
                let elapsed = state.window_start.elapsed().as_secs() as u32;
                RateLimitResult::Limited {
                    retry_after: self.config.window_seconds.saturating_sub(elapsed).max(1),
                }
            }
            _ => RateLimitResult::Allowed,
        }
    }

    /// Count one failed attempt against `ip`
    pub async fn record_failure(&self, ip: &str) {
        if !self.config.enabled || self.is_whitelisted(ip) {
            return;
        }

        let window_duration = self.config.window();
        let mut limiter = self.failures.write().await;
        let state = limiter.entry(ip.to_string()).or_insert_with(FailureWindow::new);

        if state.is_expired(window_duration) {
            state.reset();
        }
        state.count += 1;

        debug!(ip = %ip, failures = state.count, "Recorded failed auth attempt");
    }

    /// Drop windows that have run out
    pub async fn cleanup_expired(&self) {
        let window_duration = self.config.window();
        let mut limiter = self.failures.write().await;
        limiter.retain(|_, state| !state.is_expired(window_duration));
        debug!(remaining = limiter.len(), "Cleaned up expired rate limit entries");
    }
}
