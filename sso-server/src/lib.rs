//! # Discourse SSO Server
//!
//! HTTP surface for the [`sso_client`] handshake, built on axum.
//!
//! ## Routes
//!
//! | Route | Query | Response |
//! |---|---|---|
//! | `GET /sso/login` | `next` (opt), stray `sso`/`sig` stripped | 302 to provider, or to `next` when already logged in |
//! | `GET /sso/callback` | `sso`, `sig`, `next` (opt) | 302 to `next` on success; 422 plain text on rejection |
//! | `GET /sso/logout` | `next` (opt) | 302 to `next` |
//! | `GET /health` | | liveness JSON |
//!
//! ## Running
//!
//! ```text
//! DISCOURSE_SSO_SECRET=... DISCOURSE_SSO_PROVIDER=forum.example.com sso-server
//! ```
//!
//! Logging is controlled with `RUST_LOG` and written as JSON lines.

pub mod config;
pub mod error;
pub mod health;
pub mod routes;
pub mod sessions;
pub mod state;

use anyhow::Context;
use sso_client::{MemorySessionStore, MemoryUserStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

/// Install the global JSON tracing subscriber once.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().json().with_target(false))
        .init();
}

/// Spawn a background task that periodically drops expired sessions.
pub fn spawn_session_cleanup(
    store: Arc<dyn SessionStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.cleanup_expired().await {
                Ok(0) => debug!("Session cleanup: no expired sessions"),
                Ok(count) => info!(evicted = count, "Session cleanup completed"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
            }
        }
    })
}

/// Server entry point.
pub struct Server;

impl Server {
    /// Bind, serve, and run until the listener fails.
    #[instrument(name = "sso_server", skip(config), fields(listen_addr = %config.listen_addr))]
    pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let users = Arc::new(MemoryUserStore::new());

        let cleanup = spawn_session_cleanup(
            sessions.clone(),
            Duration::from_secs(config.cleanup_interval_secs),
        );

        let state = AppState::new(&config, sessions, users);
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;

        info!(
            listen_addr = %config.listen_addr,
            provider = %config.sso.provider_host,
            "SSO server listening"
        );

        let result = axum::serve(listener, app).await.context("server error");
        cleanup.abort();
        result
    }
}
