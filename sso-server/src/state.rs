//! Shared handler state.

use crate::config::{CookieConfig, ServerConfig};
use sso_client::{SessionStore, SsoClient, UserStore};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handshake client
    pub client: SsoClient,

    /// Server-side session store
    pub sessions: Arc<dyn SessionStore>,

    /// Session cookie settings
    pub cookie: CookieConfig,

    /// External base URL override
    pub public_base_url: Option<Url>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration and stores.
    pub fn new(
        config: &ServerConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            client: SsoClient::new(config.sso.clone(), users),
            sessions,
            cookie: config.cookie.clone(),
            public_base_url: config.public_base_url.clone(),
            started_at: Instant::now(),
        }
    }
}
