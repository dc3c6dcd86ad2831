//! Server configuration.
//!
//! Loaded from environment variables with defaults suitable for local
//! development. The SSO secret and provider host have no defaults.

use sso_client::{ConfigError, SsoConfig};
use std::env;
use url::Url;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "sessionid";

/// Default interval between expired-session sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind
    pub listen_addr: String,

    /// Session cookie settings
    pub cookie: CookieConfig,

    /// Scheme and host used for absolute URLs instead of the request's own
    pub public_base_url: Option<Url>,

    /// Seconds between expired-session sweeps
    pub cleanup_interval_secs: u64,

    /// SSO handshake configuration
    pub sso: SsoConfig,
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Cookie name
    pub name: String,

    /// Send the cookie over HTTPS only
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
        }
    }
}

impl ServerConfig {
    /// Defaults around an explicit SSO configuration.
    pub fn new(sso: SsoConfig) -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            cookie: CookieConfig::default(),
            public_base_url: None,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            sso,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables (besides those read by [`SsoConfig::from_env`]):
    /// - `LISTEN_ADDR`: bind address (default: 0.0.0.0:8000)
    /// - `SESSION_COOKIE_NAME`: cookie name (default: sessionid)
    /// - `SESSION_COOKIE_SECURE`: HTTPS-only cookie (default: false)
    /// - `PUBLIC_BASE_URL`: external base URL, e.g. https://app.example.com
    /// - `SESSION_CLEANUP_INTERVAL_SECS`: sweep interval (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(SsoConfig::from_env()?);

        if let Ok(addr) = env::var("LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(name) = env::var("SESSION_COOKIE_NAME") {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "SESSION_COOKIE_NAME",
                    message: "must not be empty".to_string(),
                });
            }
            config.cookie.name = name;
        }

        config.cookie.secure = env::var("SESSION_COOKIE_SECURE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        if let Ok(raw) = env::var("PUBLIC_BASE_URL") {
            config.public_base_url = Some(parse_base_url(&raw)?);
        }

        if let Ok(raw) = env::var("SESSION_CLEANUP_INTERVAL_SECS") {
            config.cleanup_interval_secs = raw
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "SESSION_CLEANUP_INTERVAL_SECS",
                    message: format!("expected positive whole seconds, got {raw:?}"),
                })?;
        }

        Ok(config)
    }
}

/// Parse `PUBLIC_BASE_URL`; only the scheme and authority are used.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: "PUBLIC_BASE_URL",
        message: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            key: "PUBLIC_BASE_URL",
            message: "expected an http(s) URL with a host".to_string(),
        });
    }

    Ok(url)
}
