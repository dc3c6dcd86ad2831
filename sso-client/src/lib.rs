//! # Discourse SSO Client
//!
//! This crate implements the client side of the Discourse single sign-on
//! handshake against one trusted provider.
//!
//! ## Overview
//!
//! - **Redirect**: store a fresh nonce in the session, send the browser to
//!   `https://<provider>/session/sso_provider?sso=<payload>&sig=<hmac>`
//! - **Callback**: verify the HMAC, pop the nonce, compare, then find or
//!   create the local user and bind it to the session
//! - **Logout**: flush the local session (no single-logout propagation)
//!
//! ## Wire format
//!
//! - `sso` = `base64(urlencode(nonce=<hex>&return_sso_url=<absolute url>))`
//! - `sig` = lowercase hex HMAC-SHA256 of the raw `sso` string, keyed by
//!   the shared secret
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sso_client::{MemoryUserStore, Session, SsoClient, SsoConfig, SsoRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), sso_client::SsoError> {
//! let config = SsoConfig::new("shared-secret", "forum.example.com");
//! let client = SsoClient::new(config, Arc::new(MemoryUserStore::new()));
//!
//! let mut session = Session::new();
//! let request = SsoRequest::new("https", "app.example.com")
//!     .with_raw_query(Some("next=%2Fdashboard"));
//!
//! let redirect = client.begin(&mut session, &request).await?;
//! println!("302 -> {}", redirect.location());
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! Sessions and users live behind the [`SessionStore`] and [`UserStore`]
//! traits. In-memory implementations are provided for single-process use
//! and tests.

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod nonce;
pub mod payload;
pub mod request;
pub mod session;
pub mod signature;
pub mod users;

// Re-export main types
pub use client::{LoginOutcome, Redirect, SsoClient};
pub use config::{ConfigError, SsoConfig};
pub use error::{SsoError, SsoResult};
pub use identity::ProviderIdentity;
pub use nonce::{Nonce, SESSION_NONCE_KEY};
pub use payload::SsoPayload;
pub use request::SsoRequest;
pub use session::{MemorySessionStore, Session, SessionCommit, SessionRecord, SessionStore};
pub use users::{MemoryUserStore, PasswordState, User, UserStore};
