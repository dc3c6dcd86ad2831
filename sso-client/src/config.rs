//! SSO client configuration.
//!
//! The shared secret and the provider hostname are configured out-of-band
//! and are required; everything else has a default.

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use thiserror::Error;

/// Path of the provider endpoint that accepts the signed payload.
pub const PROVIDER_SSO_PATH: &str = "/session/sso_provider";

/// Default local path the provider sends the browser back to.
pub const DEFAULT_CALLBACK_PATH: &str = "/sso/callback";

/// Default session lifetime (two weeks).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 14;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: &'static str,
        /// Error message.
        message: String,
    },
}

/// Discourse SSO client configuration.
#[derive(Debug, Clone)]
pub struct SsoConfig {
    /// Shared HMAC secret (`DISCOURSE_SSO_SECRET`)
    secret: SecretString,

    /// Provider hostname, e.g. `forum.example.com` (`DISCOURSE_SSO_PROVIDER`)
    pub provider_host: String,

    /// Local callback path the provider returns to
    pub callback_path: String,

    /// How long an idle server-side session stays valid
    pub session_ttl: Duration,
}

impl SsoConfig {
    /// Create a configuration with default paths and session lifetime.
    pub fn new(secret: impl Into<String>, provider_host: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into().into_boxed_str()),
            provider_host: provider_host.into(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    /// Override the callback path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Override the session lifetime.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DISCOURSE_SSO_SECRET`: shared secret (required)
    /// - `DISCOURSE_SSO_PROVIDER`: provider hostname (required)
    /// - `SSO_CALLBACK_PATH`: callback path (default: /sso/callback)
    /// - `SSO_SESSION_TTL_SECS`: session lifetime in seconds (default: two weeks)
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var("DISCOURSE_SSO_SECRET")
            .map_err(|_| ConfigError::MissingVar("DISCOURSE_SSO_SECRET"))?;
        let provider_host = env::var("DISCOURSE_SSO_PROVIDER")
            .map_err(|_| ConfigError::MissingVar("DISCOURSE_SSO_PROVIDER"))?;

        let mut config = Self::new(secret, provider_host);

        if let Ok(path) = env::var("SSO_CALLBACK_PATH") {
            config.callback_path = path;
        }

        if let Ok(ttl) = env::var("SSO_SESSION_TTL_SECS") {
            config.session_ttl = parse_session_ttl(&ttl)?;
        }

        config.validate()?;

        tracing::info!(
            provider = %config.provider_host,
            callback_path = %config.callback_path,
            "SSO config loaded"
        );

        Ok(config)
    }

    /// Reject configurations that could never complete a handshake.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose_secret().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "DISCOURSE_SSO_SECRET",
                message: "must not be empty".to_string(),
            });
        }
        if self.provider_host.is_empty() || self.provider_host.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: "DISCOURSE_SSO_PROVIDER",
                message: "must be a bare hostname".to_string(),
            });
        }
        if !self.callback_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "SSO_CALLBACK_PATH",
                message: "must start with '/'".to_string(),
            });
        }
        if self.session_ttl <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "SSO_SESSION_TTL_SECS",
                message: "must be positive".to_string(),
            });
        }
        if Utc::now().checked_add_signed(self.session_ttl).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "SSO_SESSION_TTL_SECS",
                message: "session expiry would overflow the calendar".to_string(),
            });
        }
        Ok(())
    }

    /// Shared secret bytes used as the HMAC key.
    pub fn secret(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }

    /// Provider endpoint without query string.
    pub fn provider_url(&self) -> String {
        format!("https://{}{}", self.provider_host, PROVIDER_SSO_PATH)
    }
}

/// Parse `SSO_SESSION_TTL_SECS` as whole seconds.
pub fn parse_session_ttl(raw: &str) -> Result<Duration, ConfigError> {
    let secs: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: "SSO_SESSION_TTL_SECS",
        message: format!("expected whole seconds, got {raw:?}"),
    })?;

    Duration::try_seconds(secs).ok_or_else(|| ConfigError::InvalidValue {
        key: "SSO_SESSION_TTL_SECS",
        message: format!("{secs} seconds is out of range"),
    })
}
