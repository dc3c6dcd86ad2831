//! End-to-End tests for the SSO handshake over HTTP.
//!
//! These tests drive the axum router in-process with `tower::ServiceExt::oneshot`,
//! carrying the session cookie between requests the way a browser would, and
//! play the provider's part by signing callback payloads with the shared secret.
//!
//! Test flows:
//! 1. login: redirect to the provider with a signed payload
//! 2. callback: every rejection path, then a full login
//! 3. logout: always redirects
//! 4. health: liveness JSON

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use sso_client::signature;
use sso_client::{
    MemorySessionStore, MemoryUserStore, PasswordState, SessionStore, SsoConfig, SsoPayload,
    UserStore, SESSION_NONCE_KEY,
};
use sso_server::{router, AppState, ServerConfig};
use std::sync::Arc;
use tower::ServiceExt;
use url::form_urlencoded;

const SECRET: &str = "d836444a9e4084d5b224a60c208dce14";
const PROVIDER: &str = "forum.example.com";
const HOST: &str = "app.example.com";

/// Test fixture holding the router and handles on its stores.
struct TestFixture {
    /// Application under test.
    app: Router,
    /// Session store shared with the router.
    sessions: MemorySessionStore,
    /// User store shared with the router.
    users: MemoryUserStore,
}

impl TestFixture {
    /// Create a fixture with empty in-memory stores.
    fn new() -> Self {
        let sessions = MemorySessionStore::new();
        let users = MemoryUserStore::new();
        let config = ServerConfig::new(SsoConfig::new(SECRET, PROVIDER));
        let state = AppState::new(
            &config,
            Arc::new(sessions.clone()),
            Arc::new(users.clone()),
        );

        Self {
            app: router(state),
            sessions,
            users,
        }
    }

    /// Issue a GET, optionally presenting a session cookie.
    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri).header(header::HOST, HOST);
        if let Some(id) = cookie {
            builder = builder.header(header::COOKIE, format!("sessionid={id}"));
        }
        let request = builder.body(Body::empty()).unwrap();

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Start a handshake and return `(session id, nonce)`.
    async fn begin(&self) -> (String, String) {
        let response = self.get("/sso/login?next=%2Fdashboard", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let session_id = session_cookie(&response).expect("login should set a session cookie");
        let (sso, _) = provider_params(location(&response));
        let nonce = SsoPayload::decode(&sso)
            .unwrap()
            .get("nonce")
            .unwrap()
            .to_string();

        (session_id, nonce)
    }

    /// The nonce currently stored for `session_id`.
    async fn stored_nonce(&self, session_id: &str) -> Option<String> {
        self.sessions
            .load(session_id)
            .await
            .unwrap()
            .and_then(|record| record.data.get(SESSION_NONCE_KEY).cloned())
            .and_then(|value| value.as_str().map(str::to_string))
    }
}

/// Build the callback URI the provider would redirect to.
fn callback_uri(payload: &SsoPayload, next: Option<&str>) -> String {
    let sso = payload.encode();
    let sig = signature::sign(SECRET.as_bytes(), &sso);
    signed_callback_uri(&sso, &sig, next)
}

fn signed_callback_uri(sso: &str, sig: &str, next: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(next) = next {
        query.append_pair("next", next);
    }
    query.append_pair("sso", sso).append_pair("sig", sig);
    format!("/sso/callback?{}", query.finish())
}

fn provider_identity(nonce: &str, username: &str) -> SsoPayload {
    SsoPayload::new()
        .with("nonce", nonce)
        .with("username", username)
        .with("email", format!("{username}@example.com"))
        .with("name", "Sam Sample")
        .with("external_id", "42")
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Value of the session cookie set by `response`, if any.
fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.strip_prefix("sessionid="))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Whether `response` tells the browser to drop the session cookie.
fn clears_session_cookie(response: &Response<Body>) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("sessionid=;") || v.starts_with("sessionid=\"\""))
}

/// Split a provider redirect into its `sso` and `sig` parameters.
fn provider_params(location: &str) -> (String, String) {
    let (base, query) = location.split_once('?').unwrap();
    assert_eq!(base, format!("https://{PROVIDER}/session/sso_provider"));

    let params: Vec<(String, String)> =
        form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    let get = |k: &str| params.iter().find(|(key, _)| key == k).unwrap().1.clone();
    (get("sso"), get("sig"))
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Login redirect
// ============================================================================

#[tokio::test]
async fn test_login_redirects_to_provider_with_signed_payload() {
    let fixture = TestFixture::new();

    let response = fixture
        .get("/sso/login?next=%2Fdashboard&sso=stale&sig=stale", None)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let session_id = session_cookie(&response).unwrap();
    let (sso, sig) = provider_params(location(&response));
    assert!(signature::verify(SECRET.as_bytes(), &sso, &sig));

    let payload = SsoPayload::decode(&sso).unwrap();
    let nonce = payload.get("nonce").unwrap();
    assert_eq!(nonce.len(), 32);
    assert_eq!(
        payload.get("return_sso_url"),
        Some("http://app.example.com/sso/callback?next=%2Fdashboard")
    );
    assert_eq!(fixture.stored_nonce(&session_id).await.as_deref(), Some(nonce));
}

#[tokio::test]
async fn test_each_login_issues_fresh_nonce() {
    let fixture = TestFixture::new();

    let (_, first) = fixture.begin().await;
    let (_, second) = fixture.begin().await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_login_when_authenticated_goes_straight_to_next() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let response = fixture
        .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
        .await;
    let session_id = session_cookie(&response).unwrap();

    let response = fixture.get("/sso/login?next=%2Fhome", Some(&session_id)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/home");
    assert!(fixture.stored_nonce(&session_id).await.is_none());
}

#[tokio::test]
async fn test_login_refuses_script_next() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;
    let response = fixture
        .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
        .await;
    let session_id = session_cookie(&response).unwrap();

    let response = fixture
        .get("/sso/login?next=javascript%3Aalert(1)", Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Callback rejections
// ============================================================================

#[tokio::test]
async fn test_callback_without_signature_is_rejected() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    for uri in ["/sso/callback", "/sso/callback?sso=abc", "/sso/callback?sig=abc"] {
        let response = fixture.get(uri, Some(&session_id)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_text(response).await, "This request was not signed.");
    }

    assert_eq!(fixture.stored_nonce(&session_id).await, Some(nonce));
}

#[tokio::test]
async fn test_callback_with_tampered_signature_is_rejected() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let sso = provider_identity(&nonce, "sam").encode();
    let forged = provider_identity(&nonce, "admin").encode();
    let sig = signature::sign(SECRET.as_bytes(), &sso);

    let response = fixture
        .get(&signed_callback_uri(&forged, &sig, None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_text(response).await,
        "Request signature does not match expected."
    );

    assert_eq!(fixture.stored_nonce(&session_id).await, Some(nonce));
    assert!(fixture.users.is_empty().await);
}

#[tokio::test]
async fn test_callback_signed_with_other_secret_is_rejected() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let sso = provider_identity(&nonce, "sam").encode();
    let sig = signature::sign(b"not-the-secret", &sso);

    let response = fixture
        .get(&signed_callback_uri(&sso, &sig, None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_callback_without_session_nonce_is_rejected() {
    let fixture = TestFixture::new();

    let response = fixture
        .get(&callback_uri(&provider_identity("n1", "sam"), None), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "Invalid session.");
    assert!(fixture.users.is_empty().await);
}

#[tokio::test]
async fn test_nonce_mismatch_burns_nonce() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let response = fixture
        .get(&callback_uri(&provider_identity("forged", "sam"), None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(clears_session_cookie(&response));
    assert_eq!(body_text(response).await, "Login replay detected.");
    assert!(fixture.stored_nonce(&session_id).await.is_none());

    // The genuine callback arriving afterwards finds nothing to match.
    let response = fixture
        .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "Invalid session.");
    assert!(fixture.users.is_empty().await);
}

#[tokio::test]
async fn test_callback_replay_after_login_is_rejected() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;
    let uri = callback_uri(&provider_identity(&nonce, "sam"), None);

    let response = fixture.get(&uri, Some(&session_id)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let session_id = session_cookie(&response).unwrap();

    let response = fixture.get(&uri, Some(&session_id)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "Invalid session.");
}

#[tokio::test]
async fn test_callback_without_username_consumes_nonce() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let payload = SsoPayload::new().with("nonce", nonce.as_str());
    let response = fixture
        .get(&callback_uri(&payload, None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_text(response).await,
        "SSO payload is missing required field: username"
    );
    assert!(fixture.stored_nonce(&session_id).await.is_none());
}

#[tokio::test]
async fn test_callback_with_undecodable_payload_keeps_nonce() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let sso = "not base64 at all!";
    let sig = signature::sign(SECRET.as_bytes(), sso);
    let response = fixture
        .get(&signed_callback_uri(sso, &sig, None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_text(response).await, "Malformed SSO payload.");
    assert_eq!(fixture.stored_nonce(&session_id).await, Some(nonce));
}

// ============================================================================
// Successful login
// ============================================================================

#[tokio::test]
async fn test_full_handshake_creates_user_and_redirects() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let response = fixture
        .get(
            &callback_uri(&provider_identity(&nonce, "sam"), Some("/dashboard")),
            Some(&session_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/dashboard");

    // Login rotates the session id.
    let new_id = session_cookie(&response).unwrap();
    assert_ne!(new_id, session_id);
    assert!(fixture.sessions.load(&session_id).await.unwrap().is_none());

    let user = fixture.users.get_by_username("sam").await.unwrap().unwrap();
    assert_eq!(user.email.as_deref(), Some("sam@example.com"));
    assert_eq!(user.external_id.as_deref(), Some("42"));
    assert_eq!(user.password, PasswordState::Unusable);
    assert!(user.last_login.is_some());

    let record = fixture.sessions.load(&new_id).await.unwrap().unwrap();
    assert_eq!(record.user_id, Some(user.id));
    assert!(!record.data.contains_key(SESSION_NONCE_KEY));
}

#[tokio::test]
async fn test_callback_defaults_next_to_root() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;

    let response = fixture
        .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_second_login_reuses_existing_user() {
    let fixture = TestFixture::new();

    for _ in 0..2 {
        let (session_id, nonce) = fixture.begin().await;
        let response = fixture
            .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    assert_eq!(fixture.users.len().await, 1);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_ends_session() {
    let fixture = TestFixture::new();
    let (session_id, nonce) = fixture.begin().await;
    let response = fixture
        .get(&callback_uri(&provider_identity(&nonce, "sam"), None), Some(&session_id))
        .await;
    let session_id = session_cookie(&response).unwrap();

    let response = fixture.get("/sso/logout?next=%2Fbye", Some(&session_id)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/bye");
    assert!(clears_session_cookie(&response));
    assert!(fixture.sessions.load(&session_id).await.unwrap().is_none());

    // Logged out: login goes back to the provider.
    let response = fixture.get("/sso/login", Some(&session_id)).await;
    assert!(location(&response).starts_with(&format!("https://{PROVIDER}/")));
}

#[tokio::test]
async fn test_logout_without_session_still_redirects() {
    let fixture = TestFixture::new();

    let response = fixture.get("/sso/logout", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_liveness() {
    let fixture = TestFixture::new();

    let response = fixture.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], PROVIDER);
}
