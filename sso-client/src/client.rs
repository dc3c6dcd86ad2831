//! The SSO handshake.
//!
//! Three operations, each completing within one request:
//!
//! 1. [`SsoClient::begin`] stores a fresh nonce in the session and sends the
//!    browser to the provider with a signed payload.
//! 2. [`SsoClient::complete`] verifies the provider's signed callback,
//!    consumes the nonce, and logs the named user in.
//! 3. [`SsoClient::logout`] ends the local session.
//!
//! The nonce moves through `ISSUED -> CONSUMED`. It is popped from the
//! session before it is compared, so a mismatching callback still burns it
//! and the browser has to start over from `begin`.

use crate::config::SsoConfig;
use crate::error::{SsoError, SsoResult};
use crate::identity::ProviderIdentity;
use crate::nonce::{Nonce, SESSION_NONCE_KEY};
use crate::payload::SsoPayload;
use crate::request::SsoRequest;
use crate::session::Session;
use crate::signature;
use crate::users::{User, UserStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

/// Where the browser should be sent next (HTTP 302).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect(String);

impl Redirect {
    /// Target URL.
    pub fn location(&self) -> &str {
        &self.0
    }
}

impl From<Redirect> for String {
    fn from(value: Redirect) -> Self {
        value.0
    }
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The local user now bound to the session
    pub user: User,

    /// Whether the user was created by this login
    pub created: bool,

    /// Post-login destination
    pub redirect: Redirect,
}

/// Discourse SSO client.
#[derive(Clone)]
pub struct SsoClient {
    config: SsoConfig,
    users: Arc<dyn UserStore>,
}

impl SsoClient {
    /// Create a client over a user store.
    pub fn new(config: SsoConfig, users: Arc<dyn UserStore>) -> Self {
        Self { config, users }
    }

    /// Client configuration.
    pub fn config(&self) -> &SsoConfig {
        &self.config
    }

    /// The user the session is logged in as, if that user still exists.
    pub async fn authenticated_user(&self, session: &Session) -> SsoResult<Option<User>> {
        match session.user_id() {
            Some(id) => self.users.get(id).await,
            None => Ok(None),
        }
    }

    /// Sign `payload` for the wire, returning `(sso, sig)`.
    pub fn sign_payload(&self, payload: &SsoPayload) -> (String, String) {
        let sso = payload.encode();
        let sig = signature::sign(self.config.secret(), &sso);
        (sso, sig)
    }

    /// Start the handshake.
    ///
    /// An already authenticated session skips the provider and goes straight
    /// to `next`.
    pub async fn begin(&self, session: &mut Session, request: &SsoRequest) -> SsoResult<Redirect> {
        if let Some(user) = self.authenticated_user(session).await? {
            debug!(user_id = %user.id, "Already authenticated, skipping SSO");
            return Ok(Redirect(request.next()?));
        }

        let nonce = Nonce::generate();
        session.insert(SESSION_NONCE_KEY, nonce.as_str());

        let return_path = format!("{}{}", self.config.callback_path, request.forwarded_query());
        let return_url = request.absolute_url(&return_path);

        let payload = SsoPayload::new()
            .with("nonce", nonce.as_str())
            .with("return_sso_url", return_url.as_str());
        let (sso, sig) = self.sign_payload(&payload);

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("sso", &sso)
            .append_pair("sig", &sig)
            .finish();

        info!(
            provider = %self.config.provider_host,
            return_sso_url = %return_url,
            "Redirecting to SSO provider"
        );

        Ok(Redirect(format!("{}?{}", self.config.provider_url(), query)))
    }

    /// Verify the provider callback and log the user in.
    ///
    /// Rejections before the nonce is read leave the session untouched;
    /// every later outcome has consumed the nonce.
    pub async fn complete(
        &self,
        session: &mut Session,
        request: &SsoRequest,
    ) -> SsoResult<LoginOutcome> {
        let (Some(sso), Some(sig)) = (request.param("sso"), request.param("sig")) else {
            return Err(SsoError::NotSigned);
        };

        if !signature::verify(self.config.secret(), sso, sig) {
            return Err(SsoError::SignatureMismatch);
        }

        let payload = SsoPayload::decode(sso)?;
        let nonce = payload
            .get("nonce")
            .ok_or_else(|| SsoError::MalformedPayload("missing nonce".to_string()))?;

        // Pop before comparing: the nonce is spent whatever happens next.
        let expected = session
            .remove(SESSION_NONCE_KEY)
            .ok_or(SsoError::InvalidSession)?;
        if expected.as_str() != Some(nonce) {
            return Err(SsoError::ReplayDetected);
        }

        let identity = ProviderIdentity::from_payload(&payload)?;
        let (mut user, created) = self.users.get_or_create(&identity).await?;
        if created {
            info!(user_id = %user.id, username = %user.username, "Created user from SSO");
        }
        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login = Some(now);

        session.login(user.id);
        info!(user_id = %user.id, username = %user.username, "SSO login succeeded");

        Ok(LoginOutcome {
            user,
            created,
            redirect: Redirect(request.next()?),
        })
    }

    /// End the local session. The provider is not contacted.
    pub fn logout(&self, session: &mut Session, request: &SsoRequest) -> SsoResult<Redirect> {
        if let Some(user_id) = session.user_id() {
            info!(user_id = %user_id, "Logging out");
        }
        session.flush();
        Ok(Redirect(request.next()?))
    }
}
